//! Cluster CLI error types.

use thiserror::Error;

/// Errors that can occur while invoking the cluster CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("neither oc nor kubectl found in PATH")]
    NotFound,

    #[error("empty command")]
    Empty,

    #[error("failed to parse command: {0}")]
    Parse(String),

    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("command timed out after {secs}s")]
    Timeout { secs: u64, output: String },

    #[error("command failed ({status})")]
    Failed { status: String, output: String },

    #[error("context unavailable: {0}")]
    Context(String),
}

impl CliError {
    /// Output captured before the failure, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            CliError::Timeout { output, .. } | CliError::Failed { output, .. }
                if !output.is_empty() =>
            {
                Some(output.as_str())
            }
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CliError::Timeout { .. })
    }
}

/// Convenience alias for cluster CLI results.
pub type CliResult<T> = Result<T, CliError>;
