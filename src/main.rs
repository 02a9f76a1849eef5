mod agent;
mod bus;
mod commands;
mod config;
mod dispatch;
mod error;
mod scheduler;
mod session;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::agent::Agent;
use crate::config::Config;
use crate::transport::console::ConsoleTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,prayerbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Target: {}", config.target);
    info!(
        "  Schedule: '{}' in {}",
        config.schedule.pattern, config.schedule.timezone
    );
    info!(
        "  Poll: {} ({} options)",
        config.poll.question,
        config.poll.options.len()
    );

    let transport = Arc::new(ConsoleTransport::new(config.target.clone()));

    info!("Agent is starting...");
    let agent = Agent::new(config, transport);
    agent.run().await
}
