mod bootstrap;
mod health;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use dogebot_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "dogebot",
    about = "Slack RTM bot that reacts with :doge: to messages that say wow",
    after_help = "Examples:\n  SLACK_TOKEN=xoxb-... dogebot\n  dogebot --config config/dogebot.toml"
)]
struct Args {
    #[arg(long, short, help = "Path to a TOML config file (defaults to ./dogebot.toml when present)")]
    config: Option<PathBuf>,
}

fn init_logging(config: &AppConfig) {
    use dogebot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Args::parse()).await
}

async fn run(args: Args) -> Result<()> {
    let require_file = args.config.is_some();
    let config = AppConfig::load(LoadOptions {
        config_path: args.config,
        require_file,
        ..LoadOptions::default()
    })?;
    init_logging(&config);

    let bootstrap::Application { config, metrics, runner, heartbeat, liveness } =
        bootstrap::bootstrap_with_config(config).await?;

    if config.server.enabled {
        health::spawn(
            &config.server.bind_address,
            config.server.metrics_port,
            health::HealthState::new(metrics.clone(), runner.state()),
        )
        .await?;
    }

    let heartbeat = heartbeat.spawn();
    tracing::info!(event_name = "system.server.started", "dogebot listening for messages");

    // Only a fatal transport or ping error gets past this point.
    let termination = runner.run(liveness).await;
    heartbeat.abort();

    tracing::error!(
        event_name = "system.server.stopping",
        reason = %termination,
        "dogebot stopping"
    );
    Err(termination.into())
}
