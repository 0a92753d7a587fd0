//! Startup orchestration.
//!
//! Config is loaded and validated first, then the dispatcher is built,
//! then the port is bound. Any failure is fatal and reported as an error
//! so `main` can exit non-zero.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::{ConfigError, GatewayConfig, ListenerConfig};
use crate::http::GatewayServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::RouteError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid route table: {0}")]
    Routes(#[from] RouteError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Bind the listening socket described by `config`.
pub async fn bind_listener(config: &ListenerConfig) -> Result<TcpListener, StartupError> {
    let address = config.bind_address();
    TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })
}

/// Build, bind and serve until `shutdown` fires.
pub async fn run(config: GatewayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    tracing::info!(
        port = config.listener.port,
        routes = config.routes.len(),
        rate_limit = config.rate_limit.max_requests,
        window_ms = config.rate_limit.window_ms,
        timeout_ms = config.timeouts.request_ms,
        "Configuration loaded"
    );

    let server = GatewayServer::new(config)?;
    let listener = bind_listener(&server.config().listener).await?;

    if server.config().observability.metrics_enabled {
        match server.config().observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %server.config().observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Serve)
}
