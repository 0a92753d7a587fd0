//! API gateway (v1)
//!
//! A single-node API gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                      API GATEWAY                      │
//!                     │                                                      │
//!   Client Request    │  ┌──────────┐   ┌────────────┐   ┌──────────────┐   │
//!   ──────────────────┼─▶│  server  │──▶│ rate limit │──▶│ route table  │   │
//!                     │  │ (layers) │   │ (fixed win)│   │ (prefix, 1st)│   │
//!                     │  └──────────┘   └─────┬──────┘   └──────┬───────┘   │
//!                     │                   429 │             404 │           │
//!                     │                       ▼                 ▼           │
//!   Client Response   │  ┌──────────┐   ┌────────────┐   ┌──────────────┐   │
//!   ◀─────────────────┼──│ envelope │◀──│  deadline  │◀──│   forward    │◀──┼── Backend
//!                     │  │ / relay  │   │ (504)      │   │ (502)        │   │
//!                     │  └──────────┘   └────────────┘   └──────────────┘   │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use api_gateway::config::{load_config, GatewayConfig, ObservabilityConfig};
use api_gateway::lifecycle::{startup, Shutdown};
use api_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Rate-limited, prefix-routed API gateway", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listening port; overrides the file and the PORT variable.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config: GatewayConfig = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    logging::init(&config.observability);
    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Shutdown::new();
    let _signals = shutdown.trigger_on_signal();

    match startup::run(config, &shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}
