use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use steamrelay_agent::{Agent, AgentConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Serves the Steam accounts in a maFiles folder to a steamrelay gateway.
#[derive(Debug, Parser)]
#[command(name = "steamrelay-agent", version)]
struct Args {
    /// Path to config.json; relative paths inside it resolve against its
    /// directory.
    #[arg(long, short, default_value = "config/config.json")]
    config: PathBuf,

    /// Exit on the first lost connection instead of reconnecting.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AgentConfig::load(&args.config)
        .await
        .with_context(|| format!("loading {}", args.config.display()))?
        .with_env_overrides(|key| std::env::var(key).ok());

    let agent = Agent::build(config).await.context("starting agent")?;

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                on_signal.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for interrupts"),
        }
    });

    agent.run(&shutdown, args.once).await?;
    Ok(())
}
