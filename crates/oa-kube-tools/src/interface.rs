//! Collaborator traits for the cluster CLI.
//!
//! `KubeCli` implements both against a real binary; `MockCli` (in `mock.rs`)
//! implements both with scripted outputs for tests.

use async_trait::async_trait;
use oa_protocol::ContextSnapshot;

use crate::error::CliResult;

/// Runs fully resolved CLI commands.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Tool name (`oc` or `kubectl`), used for prefix stripping and history.
    fn tool(&self) -> &str;

    /// Run `command` (arguments only, no tool name) and return combined output.
    ///
    /// Implementations enforce their own timeout and report it as
    /// `CliError::Timeout`, distinct from `CliError::Failed`.
    async fn execute(&self, command: &str) -> CliResult<String>;
}

/// Reads the active cluster context.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn fetch(&self) -> CliResult<ContextSnapshot>;
}
