//! Crossview Watcher binary.
//!
//! Entry point for the headless watcher that keeps pinned resources live.

use clap::Parser;
use crossview_watcher::{WatcherArgs, WatcherConfig, WatcherService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crossview_watcher=debug,crossview_sdk=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WatcherConfig::from(WatcherArgs::parse());

    tracing::info!("Starting Crossview Watcher");
    tracing::info!("Dashboard URL: {}", config.base_url);
    tracing::info!("Context: {}", config.context);
    tracing::info!("Resources requested: {}", config.resources.len());

    let service = WatcherService::new(config)?;
    service
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", err);
            }
        })
        .await?;

    tracing::info!("Shutting down watcher");
    Ok(())
}
