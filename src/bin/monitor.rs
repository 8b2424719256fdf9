use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use opinion_monitor::bot::Bot;
use opinion_monitor::config::{AppConfig, CONFIG_PATH, Credentials};

#[derive(Parser)]
#[command(name = "monitor", about = "opinion.trade wallet monitor bot")]
struct Args {
    /// Path to the config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;
    info!("Loaded config from {}", args.config.display());

    // Missing credentials are the only unrecoverable condition; everything
    // past this point logs and carries on.
    let credentials = Credentials::from_env()?;

    info!(
        "Starting bot (poll={}s heartbeat={}s summary={:02}:{:02})",
        config.settings.poll_interval_secs,
        config.settings.heartbeat_secs,
        config.settings.summary_hour,
        config.settings.summary_minute,
    );

    Bot::new(config, credentials).run().await
}
