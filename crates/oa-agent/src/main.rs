//! oc-ai: natural-language front end for `oc` / `kubectl`.
//!
//! Wires config, the detected cluster CLI, the OpenAI generator and the
//! history file into the session engine, then dispatches the subcommand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use oa_agent::cache::TtlCache;
use oa_agent::cli::{Cli, Commands};
use oa_agent::config::AgentConfig;
use oa_agent::error::SessionError;
use oa_agent::execution::ExecutionPipeline;
use oa_agent::generation::GenerationPipeline;
use oa_agent::history::{HistorySink, JsonFileHistory};
use oa_agent::inference::{CommandGenerator, OpenAiGenerator};
use oa_agent::session::{Session, SessionOptions};
use oa_kube_tools::{ContextProvider, KubeCli};
use oa_protocol::strip_tool_prefix;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the interactive protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut cli = Cli::parse();
    let config = AgentConfig::load(cli.config.as_deref(), |name| std::env::var(name).ok())?;
    tracing::debug!(model = %config.default_model, api_base = %config.api_base, "config loaded");

    match cli.command.take() {
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
        Some(Commands::History) => show_history(&config).await,
        Some(Commands::External(args)) => {
            let kube = detect_cli(&cli, &config)?;
            let args: Vec<String> = args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            passthrough(&kube, &args).await
        }
        Some(Commands::Explain { command }) => {
            let kube = detect_cli(&cli, &config)?;
            explain(&cli, &config, &kube, &command.join(" ")).await
        }
        Some(Commands::Ai { prompt }) => {
            let kube = Arc::new(detect_cli(&cli, &config)?);
            one_shot(&cli, &config, kube, &prompt.join(" ")).await
        }
        Some(Commands::Interactive) => {
            let kube = Arc::new(detect_cli(&cli, &config)?);
            interactive(&cli, &config, kube).await
        }
    }
}

// ── Wiring ──────────────────────────────────────────────────────

fn detect_cli(cli: &Cli, config: &AgentConfig) -> anyhow::Result<KubeCli> {
    let kubeconfig = cli.kubeconfig.clone().or_else(|| config.kubeconfig_path());
    let kube = oa_kube_tools::detect(kubeconfig)
        .context("no supported CLI tool found (install oc or kubectl)")?
        .with_timeout(config.execution_timeout());
    tracing::info!(tool = kube.tool(), binary = %kube.binary().display(), "using cluster CLI");
    Ok(kube)
}

fn build_generator(
    cli: &Cli,
    config: &AgentConfig,
    tool: &str,
) -> anyhow::Result<Arc<OpenAiGenerator>> {
    let generator_config = config.generator_config(cli.ai_model.as_deref())?;
    Ok(Arc::new(OpenAiGenerator::new(generator_config, tool)?))
}

fn history_file(config: &AgentConfig) -> JsonFileHistory {
    let path = JsonFileHistory::default_path().unwrap_or_else(|| PathBuf::from("history.json"));
    JsonFileHistory::new(path, config.history_limit)
}

fn build_session<R, W>(
    cli: &Cli,
    config: &AgentConfig,
    kube: Arc<KubeCli>,
    input: R,
    output: W,
    cancel: CancellationToken,
    synchronous_history: bool,
) -> anyhow::Result<Session<R, W>>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let generator = build_generator(cli, config, kube.tool())?;
    let generation = GenerationPipeline::new(generator, Arc::new(TtlCache::default()), kube.tool())
        .with_timeout(config.generation_timeout())
        .with_cancellation(cancel.clone());

    let history: Arc<dyn HistorySink> = Arc::new(history_file(config));
    let mut execution = ExecutionPipeline::new(kube.clone(), Arc::new(TtlCache::default()), history);
    if synchronous_history {
        execution = execution.with_synchronous_history();
    }

    let options = SessionOptions {
        auto_confirm: cli.auto_confirm(config.confirm_execute),
        dry_run: cli.dry_run,
        refresh_interval: config.context_refresh_interval(),
    };

    Ok(Session::new(input, output, generation, execution, kube, options).with_cancellation(cancel))
}

// ── Subcommands ─────────────────────────────────────────────────

async fn interactive(cli: &Cli, config: &AgentConfig, kube: Arc<KubeCli>) -> anyhow::Result<()> {
    let model = cli.ai_model.as_deref().unwrap_or(&config.default_model);
    println!("Entering interactive mode. Type 'exit' to quit.");
    println!("Using {} with {}\n", kube.tool(), model);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received");
                cancel.cancel();
            }
        }
    });

    let input = BufReader::new(tokio::io::stdin());
    let mut session = build_session(
        cli,
        config,
        kube,
        input,
        tokio::io::stdout(),
        cancel.clone(),
        false,
    )?;
    let summary = session.run().await?;
    tracing::debug!(?summary, "interactive session finished");

    if cancel.is_cancelled() {
        // A pending blocking stdin read would otherwise hold runtime shutdown.
        std::process::exit(130);
    }
    Ok(())
}

async fn one_shot(
    cli: &Cli,
    config: &AgentConfig,
    kube: Arc<KubeCli>,
    prompt: &str,
) -> anyhow::Result<()> {
    let input = BufReader::new(tokio::io::stdin());
    let mut session = build_session(
        cli,
        config,
        kube,
        input,
        tokio::io::stdout(),
        CancellationToken::new(),
        true,
    )?;

    let summary = session.run_once(prompt).await?;
    if summary.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn explain(cli: &Cli, config: &AgentConfig, kube: &KubeCli, command: &str) -> anyhow::Result<()> {
    let command = strip_tool_prefix(command.trim(), kube.tool());
    let generator = build_generator(cli, config, kube.tool())?;

    let ctx = match kube.fetch().await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!(error = %e, "could not get cluster context");
            Default::default()
        }
    };

    let timeout = config.generation_timeout();
    let explanation = tokio::time::timeout(timeout, generator.explain(command))
        .await
        .map_err(|_| SessionError::GenerationTimeout {
            secs: timeout.as_secs(),
        })?
        .context("failed to explain command")?;

    println!("\nCommand Explanation: {} {}", kube.tool(), command);
    if !ctx.cluster.is_empty() {
        println!("Context:    {}", ctx.cluster);
    }
    if !ctx.namespace.is_empty() {
        println!("Namespace:  {}", ctx.namespace);
    }
    println!("\n{}", explanation.trim_end());
    Ok(())
}

async fn show_history(config: &AgentConfig) -> anyhow::Result<()> {
    let entries = history_file(config).load().await;
    if entries.is_empty() {
        println!("No command history found.");
        return Ok(());
    }

    println!("Command History:");
    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{}. [{}] {} {}",
            i + 1,
            entry
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S"),
            entry.tool,
            entry.command
        );
    }
    Ok(())
}

async fn passthrough(kube: &KubeCli, args: &[String]) -> anyhow::Result<()> {
    match kube.passthrough(args).await {
        Ok(output) => {
            print!("{output}");
            Ok(())
        }
        Err(e) => match e.output() {
            Some(output) => {
                eprint!("{output}");
                std::process::exit(1);
            }
            None => Err(e.into()),
        },
    }
}
