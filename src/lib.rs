//! Single-node API gateway library.
//!
//! Requests are admitted per client by a fixed-window rate limiter,
//! matched against an ordered prefix route table, and forwarded to the
//! selected backend under a per-request deadline.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
