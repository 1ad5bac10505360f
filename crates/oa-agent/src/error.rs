//! Session error taxonomy.
//!
//! Everything except `Configuration` is per-iteration: reported to the user,
//! after which the loop reads the next line. History write failures are not
//! errors at all; they surface as `tracing::warn!` events.

use oa_kube_tools::CliError;
use thiserror::Error;

use crate::inference::GenerationError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("command generation timed out after {secs}s")]
    GenerationTimeout { secs: u64 },

    #[error("execution failed: {message}")]
    Execution { message: String, output: String },

    #[error("command timed out after {secs}s")]
    ExecutionTimeout { secs: u64, output: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Partial command output carried by execution failures.
    pub fn output(&self) -> Option<&str> {
        match self {
            SessionError::Execution { output, .. } | SessionError::ExecutionTimeout { output, .. }
                if !output.is_empty() =>
            {
                Some(output.as_str())
            }
            _ => None,
        }
    }

    /// Whether the session can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SessionError::Configuration(_) | SessionError::Io(_))
    }
}

impl From<CliError> for SessionError {
    fn from(err: CliError) -> Self {
        match err {
            CliError::Timeout { secs, output } => SessionError::ExecutionTimeout { secs, output },
            other => {
                let output = other.output().unwrap_or_default().to_string();
                SessionError::Execution {
                    message: other.to_string(),
                    output,
                }
            }
        }
    }
}

/// Convenience alias.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_timeout_maps_to_execution_timeout() {
        let err: SessionError = CliError::Timeout {
            secs: 30,
            output: "partial".into(),
        }
        .into();
        assert!(matches!(err, SessionError::ExecutionTimeout { secs: 30, .. }));
        assert_eq!(err.output(), Some("partial"));
    }

    #[test]
    fn cli_failure_keeps_partial_output() {
        let err: SessionError = CliError::Failed {
            status: "exit status: 1".into(),
            output: "Error from server (Forbidden)".into(),
        }
        .into();
        assert!(matches!(err, SessionError::Execution { .. }));
        assert_eq!(err.output(), Some("Error from server (Forbidden)"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn configuration_is_fatal() {
        let err = SessionError::Configuration("no API key".into());
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "configuration error: no API key");
    }
}
