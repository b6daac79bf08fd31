//! IronMind command-line entry point.
//!
//! Loads configuration, wires the service context, and either runs a
//! single task or drops into a line-based REPL. Confirmation prompts are
//! answered on stdin.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use ironmind_agent::{ConfirmationChannel, Service};
use ironmind_config::{AppConfig, ConfirmationMode};
use ironmind_providers::OpenAiCompatProvider;

#[derive(Parser, Debug)]
#[command(name = "ironmind", about = "Autonomous LLM agent runtime", version)]
struct Cli {
    /// Path to the configuration file (defaults to ./ironmind.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the workspace directory
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Override the confirmation mode (yes, no, auto)
    #[arg(long)]
    confirm: Option<String>,

    /// Run a single task and exit; omit for the interactive loop
    task: Option<String>,
}

/// Answers confirmation prompts on stdin.
struct StdinConfirmation;

#[async_trait]
impl ConfirmationChannel for StdinConfirmation {
    async fn confirm(&self, tool_name: &str, operation: Option<&str>, summary: &str) -> bool {
        let op = operation.map(|o| format!(".{o}")).unwrap_or_default();
        let mut stdout = tokio::io::stdout();
        let prompt = format!("About to execute {tool_name}{op} ({summary}). Proceed? [y/N] ");
        if stdout.write_all(prompt.as_bytes()).await.is_err() {
            return false;
        }
        let _ = stdout.flush().await;

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        match reader.read_line(&mut line).await {
            Ok(_) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ironmind=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut c = AppConfig::load_from(path)?;
            c.apply_env_overrides();
            c
        }
        None => AppConfig::load()?,
    };
    if let Some(workspace) = cli.workspace {
        config.sandbox.working_directory = workspace;
    }
    if let Some(mode) = &cli.confirm {
        config.reasoner.confirmation_mode = match mode.to_lowercase().as_str() {
            "yes" => ConfirmationMode::Yes,
            "no" => ConfirmationMode::No,
            "auto" => ConfirmationMode::Auto,
            other => return Err(format!("unknown confirmation mode '{other}'").into()),
        };
    }
    config.validate()?;
    std::fs::create_dir_all(&config.sandbox.working_directory)?;

    let api_key = config.require_api_key()?.to_string();
    let provider = Arc::new(
        OpenAiCompatProvider::new(
            api_key,
            Duration::from_secs(config.provider.api_timeout_seconds),
        )?
        .with_base_url(&config.provider.api_url),
    );

    let mut reasoner = Service::build(&config, provider, Some(Arc::new(StdinConfirmation)));
    info!(
        model = %config.provider.model,
        workspace = %config.sandbox.working_directory.display(),
        "IronMind ready"
    );

    if let Some(task) = cli.task {
        let answer = reasoner.run(&task).await?;
        println!("{answer}");
        return Ok(());
    }

    // Interactive loop: one task per line, exit with an empty line or "exit"
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let task = line.trim();
        if task.is_empty() || task == "exit" || task == "quit" {
            break;
        }

        match reasoner.run(task).await {
            Ok(answer) => println!("{answer}\n"),
            Err(e) => eprintln!("error: {e}\n"),
        }
    }

    Ok(())
}
