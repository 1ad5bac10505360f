//! Natural-language command generation.
//!
//! Converts operator text ("list all pods") into a concrete cluster CLI
//! command with an explanation and a 1–5 safety level.
//!
//! - **OpenAI** (`openai.rs`): chat-completions over HTTP.
//! - **Scripted** (`mock.rs`): canned replies for tests.

pub mod mock;
pub mod openai;

use async_trait::async_trait;
use oa_protocol::{ContextSnapshot, GenerationResult, ReplyError};
use thiserror::Error;

pub use mock::ScriptedGenerator;
pub use openai::{GeneratorConfig, OpenAiGenerator};

/// Failures from the command generator.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("AI error: {0}")]
    Request(String),

    #[error("AI service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no response from AI")]
    EmptyResponse,

    #[error(transparent)]
    Reply(#[from] ReplyError),

    #[error("generation cancelled")]
    Cancelled,
}

/// Trait for engines that turn natural language into cluster CLI commands.
#[async_trait]
pub trait CommandGenerator: Send + Sync {
    /// Generate a command for `prompt` under the given cluster context.
    ///
    /// Malformed replies surface as `GenerationError::Reply`.
    async fn generate(
        &self,
        prompt: &str,
        context: &ContextSnapshot,
    ) -> Result<GenerationResult, GenerationError>;

    /// Explain an existing command in plain language.
    async fn explain(&self, command: &str) -> Result<String, GenerationError>;
}

/// System prompt for command generation.
pub fn build_system_prompt(tool: &str, ctx: &ContextSnapshot) -> String {
    format!(
        "You are an expert {upper} administrator.
Current Context:
- Cluster: {cluster}
- Namespace: {namespace}
- User: {user}
- Server: {server}

Rules:
1. Respond ONLY with: COMMAND|||EXPLANATION|||SAFETY_LEVEL(1-5)
2. SAFETY_LEVEL: 1=Safe, 3=Caution, 5=Dangerous
3. Generate commands for {tool} but DO NOT include '{tool}' at the start of the command
4. Include all required flags
5. Never include destructive commands without confirmation",
        upper = tool.to_uppercase(),
        cluster = ctx.cluster,
        namespace = ctx.namespace,
        user = ctx.user,
        server = ctx.server,
    )
}

/// User prompt for `explain`.
pub fn build_explain_prompt(tool: &str, command: &str) -> String {
    format!(
        "Explain what this {tool} command does in simple terms.
Include:
1. What resources it affects
2. Potential risks
3. Common use cases
4. Any safer alternatives if applicable

Command: {command}"
    )
}
