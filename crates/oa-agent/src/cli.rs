//! Command-line surface of the `oc-ai` binary.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "oc-ai",
    version,
    about = "AI-powered assistant for oc and kubectl",
    long_about = "Type what you want in plain language; oc-ai turns it into an oc/kubectl \
                  command, rates its risk, and runs it after confirmation. Unrecognised \
                  subcommands are passed straight to the detected CLI."
)]
pub struct Cli {
    /// Execute commands without confirmation
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    /// Show commands without executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// AI model to use (overrides `default_model`)
    #[arg(long, global = true, value_name = "MODEL")]
    pub ai_model: Option<String>,

    /// Path to the kubeconfig file
    #[arg(long, global = true, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Path to the oc-ai config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start an interactive AI session
    Interactive,

    /// Generate and run a single command from natural language
    Ai {
        /// What you want to do, e.g. "list all pods"
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// Explain what a command does
    Explain {
        /// The command to explain, e.g. "delete pod web-0"
        #[arg(
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        command: Vec<String>,
    },

    /// Show command history
    History,

    /// Anything else is passed to oc/kubectl unchanged
    #[command(external_subcommand)]
    External(Vec<OsString>),
}

impl Cli {
    /// Auto-confirm when `--yes` is given or confirmation is disabled in config.
    pub fn auto_confirm(&self, confirm_execute: bool) -> bool {
        self.yes || !confirm_execute
    }
}
