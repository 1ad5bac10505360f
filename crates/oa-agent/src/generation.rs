//! Generation pipeline: cached, time-bounded calls to the command generator.
//!
//! On a miss the generator runs as its own task under a child
//! `CancellationToken`. When the timeout fires first the token is cancelled,
//! which drops the in-flight request future instead of leaving it running.

use std::sync::Arc;
use std::time::Duration;

use oa_protocol::{ContextSnapshot, GenerationResult, strip_tool_prefix};
use tokio_util::sync::CancellationToken;

use crate::cache::{TtlCache, generation_key};
use crate::error::{SessionError, SessionResult};
use crate::inference::{CommandGenerator, GenerationError};

/// How long the session waits for a generated command.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(15);

/// A generated command and whether it came from the cache.
#[derive(Debug, Clone)]
pub struct Generated {
    pub result: GenerationResult,
    pub cached: bool,
}

pub struct GenerationPipeline {
    generator: Arc<dyn CommandGenerator>,
    cache: Arc<TtlCache<GenerationResult>>,
    tool: String,
    timeout: Duration,
    cancel: CancellationToken,
}

impl GenerationPipeline {
    pub fn new(
        generator: Arc<dyn CommandGenerator>,
        cache: Arc<TtlCache<GenerationResult>>,
        tool: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            cache,
            tool: tool.into(),
            timeout: GENERATION_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tie in-flight calls to a parent token (normally the session's).
    pub fn with_cancellation(mut self, parent: CancellationToken) -> Self {
        self.cancel = parent;
        self
    }

    /// Produce a command for `prompt` under `ctx`.
    ///
    /// Only well-formed results are cached; errors and timeouts leave the
    /// cache untouched.
    pub async fn generate(&self, prompt: &str, ctx: &ContextSnapshot) -> SessionResult<Generated> {
        let key = generation_key(prompt, ctx);
        if let Some(result) = self.cache.get(&key) {
            tracing::debug!(prompt, "generation cache hit");
            return Ok(Generated {
                result,
                cached: true,
            });
        }

        let token = self.cancel.child_token();
        let task = tokio::spawn({
            let generator = self.generator.clone();
            let prompt = prompt.to_string();
            let ctx = ctx.clone();
            let token = token.clone();
            async move {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(GenerationError::Cancelled),
                    result = generator.generate(&prompt, &ctx) => result,
                }
            }
        });

        let mut result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => {
                tracing::warn!(error = %e, prompt, "command generation failed");
                return Err(e.into());
            }
            Ok(Err(e)) => {
                return Err(GenerationError::Request(format!("generation task failed: {e}")).into());
            }
            Err(_) => {
                token.cancel();
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    prompt,
                    "command generation timed out"
                );
                return Err(SessionError::GenerationTimeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        result.command = strip_tool_prefix(&result.command, &self.tool).to_string();
        self.cache.set(key, result.clone());
        tracing::info!(
            command = %result.command,
            safety_level = result.safety_level.get(),
            "command generated"
        );

        Ok(Generated {
            result,
            cached: false,
        })
    }
}
