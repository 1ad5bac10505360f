//! Process-backed `oc` / `kubectl` client.
//!
//! - Command text is split with `shell-words` (quote-aware, no shell)
//! - stdout and stderr are captured into one buffer, in arrival order
//! - 30-second default timeout; the child is killed when it fires
//! - Output capped at 1 MiB

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use oa_protocol::ContextSnapshot;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::error::{CliError, CliResult};
use crate::interface::{CommandExecutor, ContextProvider};
use crate::kubeconfig;

/// Default bound on a single command execution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on `config view` when refreshing context.
pub const CONTEXT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum captured output in bytes (1 MiB).
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

const TRUNCATION_NOTICE: &str = "\n... [output truncated at 1MiB]";

/// A detected cluster CLI binary.
#[derive(Debug, Clone)]
pub struct KubeCli {
    tool: String,
    binary: PathBuf,
    kubeconfig: Option<PathBuf>,
    timeout: Duration,
}

impl KubeCli {
    pub fn new(tool: impl Into<String>, binary: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            binary: binary.into(),
            kubeconfig: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Point the CLI at a specific kubeconfig via `KUBECONFIG`.
    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run pre-split arguments as given, under the execution timeout.
    pub async fn passthrough(&self, args: &[String]) -> CliResult<String> {
        if args.is_empty() {
            return Err(CliError::Empty);
        }
        tracing::debug!(tool = %self.tool, ?args, "passing through");
        self.run(args, self.timeout).await
    }

    /// Spawn the binary with `args` and wait up to `timeout`.
    async fn run(&self, args: &[String], timeout: Duration) -> CliResult<String> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref kubeconfig) = self.kubeconfig {
            command.env("KUBECONFIG", kubeconfig);
        }

        let mut child = command.spawn().map_err(|e| CliError::Spawn {
            program: self.binary.display().to_string(),
            message: e.to_string(),
        })?;

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump(stdout, buffer.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump(stderr, buffer.clone()));
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(CliError::Spawn {
                    program: self.binary.display().to_string(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill timed-out command");
                }
                for handle in &pumps {
                    handle.abort();
                }
                return Err(CliError::Timeout {
                    secs: timeout.as_secs(),
                    output: snapshot(&buffer),
                });
            }
        };

        // A grandchild can keep the pipes open after the child exits.
        let drained = tokio::time::timeout_at(deadline, async {
            for handle in pumps.iter_mut() {
                let _ = handle.await;
            }
        })
        .await;
        if drained.is_err() {
            for handle in &pumps {
                handle.abort();
            }
            tracing::warn!(%status, "command output still open at timeout");
            return Err(CliError::Timeout {
                secs: timeout.as_secs(),
                output: snapshot(&buffer),
            });
        }
        let output = snapshot(&buffer);

        if status.success() {
            Ok(output)
        } else {
            Err(CliError::Failed {
                status: status.to_string(),
                output,
            })
        }
    }
}

/// Drain a child stream into the shared buffer until EOF.
fn pump<R>(mut reader: R, buffer: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let mut buf = buffer.lock().unwrap_or_else(|e| e.into_inner());
                    let room = (MAX_OUTPUT_BYTES + 1).saturating_sub(buf.len());
                    buf.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
    })
}

fn snapshot(buffer: &Mutex<Vec<u8>>) -> String {
    let bytes = buffer.lock().unwrap_or_else(|e| e.into_inner());
    if bytes.len() <= MAX_OUTPUT_BYTES {
        return String::from_utf8_lossy(&bytes).into_owned();
    }

    let mut text = String::from_utf8_lossy(&bytes[..MAX_OUTPUT_BYTES]).into_owned();
    // Truncate at last newline to avoid partial lines
    if let Some(pos) = text.rfind('\n') {
        text.truncate(pos + 1);
    }
    text.push_str(TRUNCATION_NOTICE);
    text
}

#[async_trait]
impl CommandExecutor for KubeCli {
    fn tool(&self) -> &str {
        &self.tool
    }

    async fn execute(&self, command: &str) -> CliResult<String> {
        let command = command.trim();
        if command.is_empty() {
            return Err(CliError::Empty);
        }

        let args = shell_words::split(command).map_err(|e| CliError::Parse(e.to_string()))?;
        if args.is_empty() {
            return Err(CliError::Empty);
        }

        tracing::debug!(tool = %self.tool, command, "executing");
        self.run(&args, self.timeout).await
    }
}

#[async_trait]
impl ContextProvider for KubeCli {
    async fn fetch(&self) -> CliResult<ContextSnapshot> {
        let args = ["config", "view", "-o", "json"].map(String::from);
        let output = self.run(&args, CONTEXT_TIMEOUT).await.map_err(|e| match e {
            CliError::Timeout { secs, .. } => {
                CliError::Context(format!("context fetch timed out after {secs}s"))
            }
            other => CliError::Context(format!("failed to get config: {other}")),
        })?;
        kubeconfig::parse_current_context(&output)
    }
}
