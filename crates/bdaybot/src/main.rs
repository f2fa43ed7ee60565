mod birthday;
mod config;
mod discord;
mod health;
mod version;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{error, info};

use crate::{
    birthday::BirthdayStore,
    config::{open_config, write_default_config},
    version::short_version,
};

#[derive(Parser)]
#[command(version = short_version())]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if args.init {
        write_default_config(&args.config)?;
        info!(path = ?args.config, "Created default configuration");
        return Ok(());
    }

    tracing::info!(version = short_version(), "bdaybot version");

    let config = open_config(&args.config).context("Failed to load configuration")?;
    let store = BirthdayStore::new(&config.store.path);
    info!(
        path = ?config.store.path,
        birthdays = store.load().len(),
        "Birthday store loaded"
    );

    if let Some(health) = &config.health {
        let addr = health.bind;
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(addr, store).await {
                error!(error = %e, "Health server exited");
            }
        });
    }

    discord::run(config, store).await
}
