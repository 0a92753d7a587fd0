//! Client identity resolution.
//!
//! The identity keys the rate limiter. By default it is the IP of the TCP
//! peer; behind a trusted proxy it can be taken from the first entry of a
//! forwarded-for header instead.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::ConnectInfo,
    http::{HeaderName, Request},
};

use crate::config::ClientIdentityConfig;

/// Identity used when neither the peer nor a trusted header is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone)]
pub struct ClientIdentity {
    forwarded_header: Option<HeaderName>,
}

impl ClientIdentity {
    pub fn from_config(config: &ClientIdentityConfig) -> Self {
        let forwarded_header = if config.trust_forwarded_for {
            match HeaderName::from_bytes(config.header.as_bytes()) {
                Ok(name) => Some(name),
                Err(_) => {
                    tracing::warn!(header = %config.header, "Invalid identity header, using peer address");
                    None
                }
            }
        } else {
            None
        };
        Self { forwarded_header }
    }

    /// Resolve the identity of the client that sent `request`.
    pub fn resolve<B>(&self, request: &Request<B>) -> String {
        if let Some(ip) = self.forwarded_ip(request) {
            return ip.to_string();
        }
        peer_ip(request)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }

    fn forwarded_ip<B>(&self, request: &Request<B>) -> Option<IpAddr> {
        let name = self.forwarded_header.as_ref()?;
        request
            .headers()
            .get(name)?
            .to_str()
            .ok()?
            .split(',')
            .next()?
            .trim()
            .parse()
            .ok()
    }
}

/// IP of the TCP peer, if the server recorded connection info.
pub fn peer_ip<B>(request: &Request<B>) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
