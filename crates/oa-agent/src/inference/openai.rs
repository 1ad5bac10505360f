//! OpenAI chat-completions client for command generation.
//!
//! Sends the tool/context system prompt plus the operator's text to
//! `{api_base}/chat/completions` and parses the
//! `COMMAND|||EXPLANATION|||SAFETY_LEVEL` reply.

use std::time::Duration;

use async_trait::async_trait;
use oa_protocol::{ContextSnapshot, GenerationResult};
use serde::{Deserialize, Serialize};

use super::{CommandGenerator, GenerationError, build_explain_prompt, build_system_prompt};

/// Temperature for command generation (low: we want deterministic commands).
const GENERATE_TEMPERATURE: f32 = 0.3;

/// Temperature for explanations.
const EXPLAIN_TEMPERATURE: f32 = 0.7;

/// Connection settings for the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// API base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    /// Bearer token.
    pub api_key: String,
    /// Model to use for inference.
    pub model: String,
    /// HTTP request timeout. The generation pipeline applies its own,
    /// shorter bound on top of this.
    pub timeout: Duration,
}

/// Chat-completions request body.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

/// A single message in the chat request.
#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat-completions response (only fields we need).
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Client for an OpenAI-compatible chat-completions API.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
    tool: String,
}

impl OpenAiGenerator {
    pub fn new(config: GeneratorConfig, tool: impl Into<String>) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            tool: tool.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send one system + user exchange and return the first choice's text.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "AI service returned non-200");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Request(format!("invalid response body: {e}")))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[async_trait]
impl CommandGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        prompt: &str,
        context: &ContextSnapshot,
    ) -> Result<GenerationResult, GenerationError> {
        let system = build_system_prompt(&self.tool, context);
        let reply = self.complete(&system, prompt, GENERATE_TEMPERATURE).await?;

        GenerationResult::parse_reply(&reply).map_err(|e| {
            tracing::warn!(error = %e, reply = %reply, "AI returned malformed reply");
            GenerationError::from(e)
        })
    }

    async fn explain(&self, command: &str) -> Result<String, GenerationError> {
        let user = build_explain_prompt(&self.tool, command);
        self.complete(
            "Explain this command in simple terms. Include potential risks if any.",
            &user,
            EXPLAIN_TEMPERATURE,
        )
        .await
    }
}
