//! Cluster CLI collaborators for oc-ai.
//!
//! - `CommandExecutor` / `ContextProvider` traits (mockable in tests)
//! - `KubeCli` wrapping a detected `oc` or `kubectl` binary
//! - `MockCli` for tests without a cluster
//! - kubeconfig parsing for the active context

pub mod detect;
pub mod error;
pub mod interface;
pub mod kube_cli;
pub mod kubeconfig;
pub mod mock;

// Re-exports for convenience.
pub use detect::{SUPPORTED_TOOLS, detect, detect_in, find_in_path};
pub use error::{CliError, CliResult};
pub use interface::{CommandExecutor, ContextProvider};
pub use kube_cli::KubeCli;
pub use mock::MockCli;
