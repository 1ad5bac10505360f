//! Scripted command generator for tests.
//!
//! Replays raw reply strings through the same parser the HTTP client uses,
//! and counts calls so tests can assert cache hits made no external call.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use oa_protocol::{ContextSnapshot, GenerationResult};

use super::{CommandGenerator, GenerationError};

/// Mock generator returning queued raw replies.
///
/// The last queued reply repeats once the queue is down to one entry.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    delay: Option<Duration>,
    /// Calls started.
    calls: AtomicUsize,
    /// Calls that ran to completion (not cancelled mid-delay).
    completed: AtomicUsize,
    /// Prompts received, in order.
    prompts: Mutex<Vec<(String, ContextSnapshot)>>,
}

impl ScriptedGenerator {
    /// A generator that always answers with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self::with_replies(vec![Ok(reply.into())])
    }

    /// A generator that always fails with `error`.
    pub fn failing(error: GenerationError) -> Self {
        Self::with_replies(vec![Err(error)])
    }

    pub fn with_replies(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            delay: None,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Sleep for `delay` before answering, to simulate a slow service.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<(String, ContextSnapshot)> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<String, GenerationError> {
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        reply.unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

#[async_trait]
impl CommandGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        context: &ContextSnapshot,
    ) -> Result<GenerationResult, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), context.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        let reply = self.next_reply()?;
        Ok(GenerationResult::parse_reply(&reply)?)
    }

    async fn explain(&self, command: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(format!("`{command}` reads cluster state and changes nothing."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_queue_then_repeats_last() {
        let generator = ScriptedGenerator::with_replies(vec![
            Ok("get pods|||a|||1".into()),
            Ok("get svc|||b|||2".into()),
        ]);
        let ctx = ContextSnapshot::default();

        assert_eq!(generator.generate("x", &ctx).await.unwrap().command, "get pods");
        assert_eq!(generator.generate("x", &ctx).await.unwrap().command, "get svc");
        assert_eq!(generator.generate("x", &ctx).await.unwrap().command, "get svc");
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn malformed_reply_is_error() {
        let generator = ScriptedGenerator::new("not a command");
        let err = generator
            .generate("x", &ContextSnapshot::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Reply(_)));
    }

    #[tokio::test]
    async fn records_prompts() {
        let generator = ScriptedGenerator::new("get pods|||a|||1");
        let ctx = ContextSnapshot::new("c1", "demo", "", "");
        generator.generate("list all pods", &ctx).await.unwrap();

        let prompts = generator.prompts();
        assert_eq!(prompts[0].0, "list all pods");
        assert_eq!(prompts[0].1.namespace, "demo");
    }
}
