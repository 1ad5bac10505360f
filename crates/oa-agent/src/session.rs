//! Interactive session loop.
//!
//! One line of operator text per iteration:
//!
//! ```text
//! ReadInput → Generating → Confirming → Executing → ReadInput
//!                 │             │ r
//!                 │             └→ ReadingRevision → Executing
//!                 └ timeout / error → ReadInput
//! ```
//!
//! `exit` / `quit` (exact, checked only at `ReadInput`) or end of input
//! terminates the loop and stops the context refresher. Every other failure
//! is reported on the output stream and the loop continues.

use std::sync::Arc;
use std::time::Duration;

use oa_kube_tools::ContextProvider;
use oa_protocol::{ContextSnapshot, GenerationResult, strip_tool_prefix};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::context_refresh::{ContextHandle, ContextRefresher, REFRESH_INTERVAL};
use crate::error::{SessionError, SessionResult};
use crate::execution::{Executed, ExecutionPipeline};
use crate::gate::{Answer, Decision, decide, resolve_answer};
use crate::generation::GenerationPipeline;

/// Flags that shape every iteration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Skip the confirmation prompt for high safety levels.
    pub auto_confirm: bool,
    /// Show generated commands without running them.
    pub dry_run: bool,
    /// Context refresher tick.
    pub refresh_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_confirm: false,
            dry_run: false,
            refresh_interval: REFRESH_INTERVAL,
        }
    }
}

/// Counters reported when the session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Non-blank prompts processed.
    pub iterations: usize,
    /// Commands that produced output (fresh or cached).
    pub executed: usize,
    /// Commands declined at the confirmation prompt.
    pub aborted: usize,
    /// Generation or execution failures reported to the operator.
    pub errors: usize,
}

/// Whether the confirmation prompt offers `r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Revise {
    Allowed,
    Disabled,
}

pub struct Session<R, W> {
    input: R,
    output: W,
    generation: GenerationPipeline,
    execution: ExecutionPipeline,
    provider: Arc<dyn ContextProvider>,
    options: SessionOptions,
    cancel: CancellationToken,
}

impl<R, W> Session<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        input: R,
        output: W,
        generation: GenerationPipeline,
        execution: ExecutionPipeline,
        provider: Arc<dyn ContextProvider>,
        options: SessionOptions,
    ) -> Self {
        Self {
            input,
            output,
            generation,
            execution,
            provider,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop reading input once `cancel` fires (e.g. on Ctrl-C).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    /// Run the interactive loop until `exit`, `quit`, end of input or
    /// cancellation.
    pub async fn run(&mut self) -> SessionResult<SessionSummary> {
        let span = tracing::info_span!("session", id = %Uuid::now_v7());
        async {
            let refresher_cancel = self.cancel.child_token();
            let (refresher, mut context) = ContextRefresher::spawn(
                self.provider.clone(),
                self.options.refresh_interval,
                refresher_cancel.clone(),
            );

            let mut summary = SessionSummary::default();
            let result = self.run_loop(&mut context, &mut summary).await;

            refresher_cancel.cancel();
            if let Err(e) = refresher.await {
                tracing::warn!(error = %e, "context refresher ended abnormally");
            }
            self.execution.drain().await;

            tracing::info!(
                iterations = summary.iterations,
                executed = summary.executed,
                aborted = summary.aborted,
                errors = summary.errors,
                "session ended"
            );
            result.map(|()| summary)
        }
        .instrument(span)
        .await
    }

    /// Process a single prompt without the loop: one generation, a yes/no
    /// confirmation if the gate asks for one, one execution.
    pub async fn run_once(&mut self, prompt: &str) -> SessionResult<SessionSummary> {
        let ctx = match self.provider.fetch().await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(error = %e, "could not read cluster context");
                ContextSnapshot::default()
            }
        };

        let mut summary = SessionSummary {
            iterations: 1,
            ..SessionSummary::default()
        };
        let result = self
            .handle_prompt(prompt.trim(), &ctx, Revise::Disabled, &mut summary)
            .await;
        self.execution.drain().await;
        result.map(|()| summary)
    }

    async fn run_loop(
        &mut self,
        context: &mut ContextHandle,
        summary: &mut SessionSummary,
    ) -> SessionResult<()> {
        loop {
            let ctx = context.current(self.provider.as_ref()).await;
            self.say(&ctx.prompt_label()).await?;

            let Some(line) = self.read_line().await? else {
                tracing::debug!("end of input");
                break;
            };
            let input = line.trim();

            if input == "exit" || input == "quit" {
                break;
            }
            if input.is_empty() {
                continue;
            }

            summary.iterations += 1;
            self.handle_prompt(input, &ctx, Revise::Allowed, summary)
                .await?;
            self.say("\n").await?;
        }
        Ok(())
    }

    /// Generating → Confirming → Executing for one prompt.
    async fn handle_prompt(
        &mut self,
        prompt: &str,
        ctx: &ContextSnapshot,
        revise: Revise,
        summary: &mut SessionSummary,
    ) -> SessionResult<()> {
        let generated = match self.generation.generate(prompt, ctx).await {
            Ok(generated) => generated,
            Err(SessionError::GenerationTimeout { .. }) => {
                summary.errors += 1;
                return self.say("Command generation timed out\n").await;
            }
            Err(e) if e.is_recoverable() => {
                summary.errors += 1;
                return self.say(&format!("Error: {e}\n")).await;
            }
            Err(e) => return Err(e),
        };
        let result = generated.result;
        self.show_generated(&result).await?;

        let decision = decide(
            result.safety_level,
            self.options.auto_confirm,
            self.options.dry_run,
        );
        let command = match decision {
            Decision::DryRunOnly => {
                return self.say("Dry run - command not executed\n").await;
            }
            Decision::Execute => result.command,
            Decision::Prompt => match self.confirm(&result.command, revise).await? {
                Some(command) => command,
                None => {
                    summary.aborted += 1;
                    return self.say("Command not executed\n").await;
                }
            },
            Decision::Abort => {
                summary.aborted += 1;
                return self.say("Command not executed\n").await;
            }
        };

        self.execute(&command, summary).await
    }

    /// Confirming (and ReadingRevision). Returns the command to run, or
    /// `None` when the operator declined.
    async fn confirm(&mut self, command: &str, revise: Revise) -> SessionResult<Option<String>> {
        let question = match revise {
            Revise::Allowed => "\nExecute? [y/N/r (run/revise)]: ",
            Revise::Disabled => "\nExecute? [y/N]: ",
        };
        self.say(question).await?;
        let answer = self.read_line().await?.unwrap_or_default();

        match (resolve_answer(&answer), revise) {
            (Answer::Yes, _) => Ok(Some(command.to_string())),
            (Answer::Revise, Revise::Allowed) => {
                self.say("Enter revised command: ").await?;
                let revised = self.read_line().await?.unwrap_or_default();
                let revised = strip_tool_prefix(revised.trim(), self.execution.tool()).trim();
                if revised.is_empty() {
                    return Ok(None);
                }
                tracing::info!(original = command, revised, "command revised");
                Ok(Some(revised.to_string()))
            }
            _ => Ok(None),
        }
    }

    async fn execute(&mut self, command: &str, summary: &mut SessionSummary) -> SessionResult<()> {
        match self.execution.run(command).await {
            Ok(Executed { output, cached }) => {
                summary.executed += 1;
                if cached {
                    self.say("Output (cached):\n").await?;
                } else if !output.is_empty() {
                    self.say("Output:\n").await?;
                }
                if !output.is_empty() {
                    self.say(output.trim_end()).await?;
                    self.say("\n").await?;
                }
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                summary.errors += 1;
                let mut text = format!("Error: {e}\n");
                if let Some(output) = e.output() {
                    text.push_str(&format!("Output: {}\n", output.trim_end()));
                }
                self.say(&text).await
            }
            Err(e) => Err(e),
        }
    }

    async fn show_generated(&mut self, result: &GenerationResult) -> SessionResult<()> {
        let text = format!(
            "\nCommand: {} {}\nExplanation: {}\nSafety Level: {}\n",
            self.execution.tool(),
            result.command,
            result.explanation,
            result.safety_level,
        );
        self.say(&text).await
    }

    /// One line of input, or `None` at end of input or on cancellation.
    async fn read_line(&mut self) -> SessionResult<Option<String>> {
        let mut line = String::new();
        let read = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(None),
            read = self.input.read_line(&mut line) => read?,
        };
        Ok((read > 0).then_some(line))
    }

    async fn say(&mut self, text: &str) -> SessionResult<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}
