//! Execution pipeline: execution cache in front of the executor, plus history submission.
//!
//! The cache is keyed by the literal command (arguments only). A hit is
//! returned as-is: no executor call and no new history entry. A fresh,
//! non-empty result is cached and handed to the history sink on a detached
//! task, so the operator sees the output before the write lands. Those
//! tasks are tracked; `drain` waits for them before the session returns.

use std::sync::Arc;
use std::time::Duration;

use oa_kube_tools::CommandExecutor;
use oa_protocol::{HistoryEntry, strip_tool_prefix};
use tokio_util::task::TaskTracker;

use crate::cache::TtlCache;
use crate::error::SessionResult;
use crate::history::HistorySink;

/// Upper bound on waiting for pending history writes at shutdown.
pub const HISTORY_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Output of one executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
    pub output: String,
    pub cached: bool,
}

pub struct ExecutionPipeline {
    executor: Arc<dyn CommandExecutor>,
    cache: Arc<TtlCache<String>>,
    history: Arc<dyn HistorySink>,
    tool: String,
    detach_history: bool,
    pending: TaskTracker,
}

impl ExecutionPipeline {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        cache: Arc<TtlCache<String>>,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        let tool = executor.tool().to_string();
        Self {
            executor,
            cache,
            history,
            tool,
            detach_history: true,
            pending: TaskTracker::new(),
        }
    }

    /// Await history writes instead of detaching them. Used by one-shot
    /// commands, where the process exits right after the output.
    pub fn with_synchronous_history(mut self) -> Self {
        self.detach_history = false;
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Run `command`, serving it from the execution cache when possible.
    pub async fn run(&self, command: &str) -> SessionResult<Executed> {
        let command = strip_tool_prefix(command.trim(), &self.tool).trim();

        if let Some(output) = self.cache.get(command) {
            tracing::debug!(command, "execution cache hit");
            return Ok(Executed {
                output,
                cached: true,
            });
        }

        tracing::info!(tool = %self.tool, command, "executing command");
        let output = match self.executor.execute(command).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(command, error = %e, "command failed");
                return Err(e.into());
            }
        };

        if !output.is_empty() {
            self.cache.set(command, output.clone());
            self.record(command).await;
        }

        Ok(Executed {
            output,
            cached: false,
        })
    }

    async fn record(&self, command: &str) {
        let entry = HistoryEntry::new(self.tool.as_str(), command);
        let history = self.history.clone();
        let write = async move {
            if let Err(e) = history.append(entry).await {
                tracing::warn!(error = %e, "failed to save command to history");
            }
        };

        if self.detach_history {
            self.pending.spawn(write);
        } else {
            write.await;
        }
    }

    /// Wait for detached history writes, up to `HISTORY_DRAIN_TIMEOUT`.
    pub async fn drain(&self) {
        self.pending.close();
        if tokio::time::timeout(HISTORY_DRAIN_TIMEOUT, self.pending.wait())
            .await
            .is_err()
        {
            tracing::warn!(pending = self.pending.len(), "history writes still pending at shutdown");
        }
        self.pending.reopen();
    }
}
