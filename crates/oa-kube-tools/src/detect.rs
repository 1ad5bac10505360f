//! Locate the cluster CLI binary on `PATH`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::{CliError, CliResult};
use crate::kube_cli::KubeCli;

/// Supported tools in preference order.
pub const SUPPORTED_TOOLS: &[&str] = &["oc", "kubectl"];

/// Detect `oc` (preferred) or `kubectl` on the process `PATH`.
pub fn detect(kubeconfig: Option<PathBuf>) -> CliResult<KubeCli> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    detect_in(&path_var, kubeconfig)
}

/// Detect a supported tool in an explicit `PATH`-style search list.
pub fn detect_in(path_var: &OsStr, kubeconfig: Option<PathBuf>) -> CliResult<KubeCli> {
    for &tool in SUPPORTED_TOOLS {
        if let Some(binary) = find_in_path(tool, path_var) {
            tracing::debug!(tool, binary = %binary.display(), "cluster CLI detected");
            return Ok(KubeCli::new(tool, binary).with_kubeconfig(kubeconfig));
        }
    }
    Err(CliError::NotFound)
}

/// First executable file called `name` in the search list.
pub fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
