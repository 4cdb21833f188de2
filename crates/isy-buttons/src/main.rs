//! ISY994 button coordinator daemon
//!
//! Loads the app configuration, wires the coordinator to the host runtime
//! surface, and runs until interrupted.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use isy_buttons::{AppConfig, Coordinator};
use isy_hass::Hass;

const DEFAULT_CONFIG_PATH: &str = "isy_buttons.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!(path = %path, "Loading configuration");
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file {path}"))?;
    let config: AppConfig = serde_yaml::from_str(&raw).context("failed to parse configuration")?;

    let config = match config.validate() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            anyhow::bail!("invalid configuration: {err}");
        }
    };

    let hass = Arc::new(Hass::new());
    let coordinator = Coordinator::new(hass.clone(), config);
    let coordinator_task = tokio::spawn(coordinator.run());

    tokio::select! {
        result = coordinator_task => {
            if let Ok(Err(err)) = result {
                error!(error = %err, "Coordinator terminated");
                anyhow::bail!("coordinator terminated: {err}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
