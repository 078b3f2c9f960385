//! # mealmate
//!
//! Mealmate server binary: loads settings, initializes logging, and serves
//! the affiliate proxy and meal-plan hub until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mealmate_affiliate::{AffiliateClient, CoupangClient};
use mealmate_core::logging::{LogFormat, init_subscriber};
use mealmate_server::config::ServerConfig;
use mealmate_server::server::MealmateServer;
use mealmate_settings::MealmateSettings;

/// Mealmate server.
#[derive(Parser, Debug)]
#[command(name = "mealmate", about = "Mealmate affiliate proxy and real-time hub")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.mealmate/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn server_config(&self, settings: &MealmateSettings) -> ServerConfig {
        let mut config = ServerConfig::from(&settings.server);
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(mealmate_settings::settings_path);
    let settings = mealmate_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    let format = if args.log_json || settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_subscriber(&settings.logging.level, format);

    if !settings.affiliate.has_credentials() {
        tracing::warn!("affiliate credentials not configured; proxy calls will fail");
    }
    let client: Arc<dyn AffiliateClient> = Arc::new(
        CoupangClient::new(&settings.affiliate).context("Failed to build affiliate client")?,
    );

    let server = MealmateServer::new(args.server_config(&settings), client);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Mealmate listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let drained = server.shutdown().drain(vec![handle], None).await;
    if !drained {
        tracing::warn!("server did not stop in time");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
