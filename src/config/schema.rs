//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Route table, matched in declaration order.
    pub routes: Vec<RouteConfig>,

    /// Per-client admission control.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// How the client identity used for rate limiting is derived.
    pub client_identity: ClientIdentityConfig,

    /// Response hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port. The `PORT` environment variable takes precedence.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// A single route: requests whose path starts with `prefix` go to `target`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics. Defaults to the prefix.
    #[serde(default)]
    pub name: Option<String>,

    /// Path prefix to match (segment-aware).
    pub prefix: String,

    /// Backend base URL, e.g. "http://users.internal:8080".
    pub target: String,

    /// Remove the matched prefix before forwarding.
    #[serde(default = "default_true")]
    pub strip_prefix: bool,

    /// Rewrite the `Host` header to the target's authority.
    #[serde(default = "default_true")]
    pub change_origin: bool,
}

impl RouteConfig {
    /// Convenience constructor with the default rewrite options.
    pub fn new(prefix: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: None,
            prefix: prefix.into(),
            target: target.into(),
            strip_prefix: true,
            change_origin: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per client per window.
    pub max_requests: u32,

    /// Window length in milliseconds. All counters reset together.
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 20,
            window_ms: 60_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for an admitted request, until the backend responds.
    pub request_ms: u64,

    /// TCP connect timeout towards backends.
    pub connect_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 15_000,
            connect_ms: 5_000,
        }
    }
}

/// Client identity derivation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientIdentityConfig {
    /// Use the first address of `header` instead of the peer address.
    /// Only enable behind a proxy that sets this header.
    pub trust_forwarded_for: bool,

    /// Header carrying the original client address.
    pub header: String,
}

impl Default for ClientIdentityConfig {
    fn default() -> Self {
        Self {
            trust_forwarded_for: false,
            header: "x-forwarded-for".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Add security response headers if the backend did not set them.
    pub security_headers: bool,
    /// Answer CORS preflights and allow any origin.
    pub cors: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            security_headers: true,
            cors: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
