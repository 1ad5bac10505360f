//! Shared test harness for E2E integration tests.
//!
//! Wires the real `OpenAiGenerator` (against a wiremock chat-completions
//! server), a `MockCli` cluster, and a `JsonFileHistory` in a temp dir into
//! sessions that read scripted input and write to an in-memory buffer.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oa_agent::cache::{CACHE_TTL, TtlCache};
use oa_agent::execution::ExecutionPipeline;
use oa_agent::generation::GenerationPipeline;
use oa_agent::history::{HistorySink, JsonFileHistory};
use oa_agent::inference::{GeneratorConfig, OpenAiGenerator};
use oa_agent::session::{Session, SessionOptions};
use oa_kube_tools::MockCli;
use oa_protocol::{GenerationResult, HistoryEntry};

/// End-to-end harness: generator service, cluster CLI, history file, and the
/// two caches shared by every session built from it.
pub struct TestHarness {
    /// Mock chat-completions endpoint.
    pub server: MockServer,
    /// Mock `oc` in cluster `c1`, namespace `demo`.
    pub cli: Arc<MockCli>,
    /// History file under `history_dir`.
    pub history: Arc<JsonFileHistory>,
    pub generation_cache: Arc<TtlCache<GenerationResult>>,
    pub execution_cache: Arc<TtlCache<String>>,
    /// Pipeline bound on generation.
    pub generation_timeout: Duration,
    history_dir: TempDir,
}

impl TestHarness {
    pub async fn start() -> Self {
        let history_dir = tempfile::tempdir().unwrap();
        let history = Arc::new(JsonFileHistory::new(
            history_dir.path().join("history.json"),
            100,
        ));

        Self {
            server: MockServer::start().await,
            cli: Arc::new(MockCli::with_demo_cluster()),
            history,
            generation_cache: Arc::new(TtlCache::new(CACHE_TTL)),
            execution_cache: Arc::new(TtlCache::new(CACHE_TTL)),
            generation_timeout: Duration::from_secs(15),
            history_dir,
        }
    }

    /// Shorten the generation bound (for timeout tests against a real socket).
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Answer every chat request with `content`.
    pub async fn reply(&self, content: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(content)))
            .mount(&self.server)
            .await;
    }

    /// Answer chat requests whose body mentions `prompt` with `content`.
    pub async fn reply_to(&self, prompt: &str, content: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(prompt))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(content)))
            .mount(&self.server)
            .await;
    }

    /// Answer every chat request with `content`, but only after `delay`.
    pub async fn reply_slowly(&self, content: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_response(content))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Fail every chat request with `status`.
    pub async fn reply_status(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    pub fn generator(&self) -> Arc<OpenAiGenerator> {
        let config = GeneratorConfig {
            api_base: self.server.uri(),
            api_key: "sk-test".into(),
            model: "gpt-4-turbo".into(),
            timeout: Duration::from_secs(10),
        };
        Arc::new(OpenAiGenerator::new(config, "oc").unwrap())
    }

    /// A session reading `input` with default options.
    pub fn session<'a>(&self, input: &'a str) -> Session<&'a [u8], Vec<u8>> {
        self.session_with(input, SessionOptions::default())
    }

    pub fn session_with<'a>(
        &self,
        input: &'a str,
        options: SessionOptions,
    ) -> Session<&'a [u8], Vec<u8>> {
        self.session_with_sink(input, options, self.history.clone())
    }

    /// A session whose history goes to `sink` instead of the harness file.
    pub fn session_with_sink<'a>(
        &self,
        input: &'a str,
        options: SessionOptions,
        sink: Arc<dyn HistorySink>,
    ) -> Session<&'a [u8], Vec<u8>> {
        let generation =
            GenerationPipeline::new(self.generator(), self.generation_cache.clone(), "oc")
                .with_timeout(self.generation_timeout);
        let execution =
            ExecutionPipeline::new(self.cli.clone(), self.execution_cache.clone(), sink);
        Session::new(
            input.as_bytes(),
            Vec::new(),
            generation,
            execution,
            self.cli.clone(),
            options,
        )
    }

    /// Number of requests the generator service has received.
    pub async fn generator_requests(&self) -> usize {
        self.server.received_requests().await.unwrap_or_default().len()
    }

    /// Poll the history file until it holds `count` entries (writes are
    /// fire-and-forget), giving up after two seconds.
    pub async fn history_entries(&self, count: usize) -> Vec<HistoryEntry> {
        for _ in 0..200 {
            let entries = self.history.load().await;
            if entries.len() >= count {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.history.load().await
    }
}

/// Session output as text.
pub fn output(session: &Session<&[u8], Vec<u8>>) -> String {
    String::from_utf8_lossy(session.output()).into_owned()
}

/// Build a chat-completions response body.
pub fn chat_response(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-e2e",
        "object": "chat.completion",
        "model": "gpt-4-turbo",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}
