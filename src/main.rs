//! wxwatch - poll a remote weather image and announce new versions
//!
//! Meant to be run by an external scheduler (cron, launchd, a systemd
//! timer). Each invocation performs exactly one check.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wxwatch::{config::WatchConfig, ChangePipeline, RunOutcome};

#[derive(Parser)]
#[command(name = "wxwatch")]
#[command(version)]
#[command(about = "Poll a remote weather image and announce new versions")]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, env = "WXWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding state, images and slack.json
    #[arg(long, env = "WXWATCH_HOME")]
    home: Option<PathBuf>,

    /// Remote image to watch
    #[arg(long)]
    url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::from(2);
        }
    };

    if cli.print_config {
        return match toml::to_string_pretty(&config) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("Failed to render configuration: {}", e);
                ExitCode::from(2)
            }
        };
    }

    let pipeline = ChangePipeline::from_config(&config).await;

    match pipeline.run().await {
        Ok(RunOutcome::Unchanged { .. }) => ExitCode::SUCCESS,
        Ok(RunOutcome::Delivered { artifact, .. }) => {
            tracing::info!("New image at {}", artifact.path.display());
            ExitCode::SUCCESS
        }
        // Already logged at the failing stage
        Err(_) => ExitCode::FAILURE,
    }
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("wxwatch={}", log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn load_config(cli: &Cli) -> Result<WatchConfig> {
    let mut config = match &cli.config {
        Some(path) => WatchConfig::load(path).await?,
        None => WatchConfig::default(),
    };

    if let Some(home) = &cli.home {
        config.home = home.clone();
    }
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }

    Ok(config)
}
