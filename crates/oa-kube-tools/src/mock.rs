//! Mock cluster CLI for testing without a cluster.
//!
//! Serves scripted outputs per command, records every call, and can stand in
//! for a slow or broken CLI via an artificial delay or a failing context.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use oa_protocol::ContextSnapshot;

use crate::error::{CliError, CliResult};
use crate::interface::{CommandExecutor, ContextProvider};

/// Scripted result for one command.
#[derive(Debug, Clone)]
enum Scripted {
    Output(String),
    Failure(String),
}

/// Mock implementation of `CommandExecutor` and `ContextProvider`.
pub struct MockCli {
    tool: String,
    scripted: Mutex<HashMap<String, Scripted>>,
    /// All commands passed to `execute` (for test assertions).
    executed: Mutex<Vec<String>>,
    /// Context returned by `fetch`; `None` makes `fetch` fail.
    context: Mutex<Option<ContextSnapshot>>,
    context_fetches: AtomicUsize,
    /// Delay applied before every `execute` result.
    delay: Option<Duration>,
    /// Executions longer than this report `CliError::Timeout`.
    timeout: Option<Duration>,
}

impl MockCli {
    /// Create a mock for `tool` with no scripted commands and an empty context.
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            scripted: Mutex::new(HashMap::new()),
            executed: Mutex::new(Vec::new()),
            context: Mutex::new(Some(ContextSnapshot::default())),
            context_fetches: AtomicUsize::new(0),
            delay: None,
            timeout: None,
        }
    }

    /// An `oc` mock in cluster `c1`, namespace `demo`, with `get pods` scripted.
    pub fn with_demo_cluster() -> Self {
        let mock = Self::new("oc");
        mock.set_context(ContextSnapshot::new(
            "c1",
            "demo",
            "admin",
            "https://api.c1.example.com:6443",
        ));
        mock.add_output(
            "get pods",
            "NAME                   READY   STATUS    RESTARTS   AGE\n\
             web-7d4b9c6f5d-x2k8p   1/1     Running   0          3d\n\
             db-0                   1/1     Running   1          3d\n",
        );
        mock
    }

    /// Delay every `execute` call by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report `CliError::Timeout` when the delay exceeds `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Script a successful output for `command`.
    pub fn add_output(&self, command: impl Into<String>, output: impl Into<String>) {
        self.scripted
            .lock()
            .unwrap()
            .insert(command.into(), Scripted::Output(output.into()));
    }

    /// Script a non-zero exit for `command` with the given output.
    pub fn add_failure(&self, command: impl Into<String>, output: impl Into<String>) {
        self.scripted
            .lock()
            .unwrap()
            .insert(command.into(), Scripted::Failure(output.into()));
    }

    /// Replace the context returned by `fetch`.
    pub fn set_context(&self, context: ContextSnapshot) {
        *self.context.lock().unwrap() = Some(context);
    }

    /// Make every subsequent `fetch` fail.
    pub fn fail_context(&self) {
        *self.context.lock().unwrap() = None;
    }

    /// Commands executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Number of times `command` was executed.
    pub fn execution_count(&self, command: &str) -> usize {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }

    pub fn context_fetches(&self) -> usize {
        self.context_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandExecutor for MockCli {
    fn tool(&self) -> &str {
        &self.tool
    }

    async fn execute(&self, command: &str) -> CliResult<String> {
        self.executed.lock().unwrap().push(command.to_string());

        if let Some(delay) = self.delay {
            if let Some(timeout) = self.timeout.filter(|t| delay > *t) {
                tokio::time::sleep(timeout).await;
                return Err(CliError::Timeout {
                    secs: timeout.as_secs(),
                    output: String::new(),
                });
            }
            tokio::time::sleep(delay).await;
        }

        let scripted = self.scripted.lock().unwrap().get(command).cloned();
        match scripted {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Failure(output)) => Err(CliError::Failed {
                status: "exit status: 1".into(),
                output,
            }),
            None => Err(CliError::Failed {
                status: "exit status: 1".into(),
                output: format!("error: unknown command \"{command}\" for \"{}\"", self.tool),
            }),
        }
    }
}

#[async_trait]
impl ContextProvider for MockCli {
    async fn fetch(&self) -> CliResult<ContextSnapshot> {
        self.context_fetches.fetch_add(1, Ordering::SeqCst);
        self.context
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CliError::Context("mock context unavailable".into()))
    }
}
