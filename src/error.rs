//! Gateway error taxonomy.
//!
//! Every variant resolves to a locally generated envelope response. The
//! `Display` text is for logs; clients only ever see the generic message
//! returned by [`GatewayError::public_message`].

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::response::Envelope;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Client exceeded its allowance for the current window.
    #[error("rate limit exceeded for client {client} ({count} requests this window)")]
    AdmissionRejected {
        client: String,
        count: u32,
        retry_after: Duration,
    },

    /// No configured prefix matches the path.
    #[error("no route for path {path}")]
    RouteNotFound { path: String },

    /// The backend did not answer before the request deadline.
    #[error("upstream {target} did not respond within {after:?}")]
    UpstreamTimeout { target: String, after: Duration },

    /// Connecting to the backend failed.
    #[error("upstream {target} unreachable: {source}")]
    UpstreamUnreachable {
        target: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    /// The backend connection broke or produced an unparseable response.
    #[error("upstream {target} protocol error: {source}")]
    UpstreamProtocolError {
        target: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    /// Path rewriting produced something that is not a valid URI.
    #[error("rewritten upstream URI is invalid: {0}")]
    InvalidUpstreamUri(#[from] axum::http::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AdmissionRejected { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamUnreachable { .. }
            | GatewayError::UpstreamProtocolError { .. }
            | GatewayError::InvalidUpstreamUri(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message sent to the client. Never includes backend details.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::AdmissionRejected { .. } => "Rate limit exceeded.",
            GatewayError::RouteNotFound { .. } => "Route not found",
            GatewayError::UpstreamTimeout { .. } => "Gateway timeout.",
            GatewayError::UpstreamUnreachable { .. }
            | GatewayError::UpstreamProtocolError { .. }
            | GatewayError::InvalidUpstreamUri(_) => "Bad gateway.",
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::AdmissionRejected { .. } => "rate_limited",
            GatewayError::RouteNotFound { .. } => "route_not_found",
            GatewayError::UpstreamTimeout { .. } => "timeout",
            GatewayError::UpstreamUnreachable { .. } => "unreachable",
            GatewayError::UpstreamProtocolError { .. } => "protocol_error",
            GatewayError::InvalidUpstreamUri(_) => "invalid_uri",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = Envelope::error(self.status_code(), self.public_message()).into_response();

        if let GatewayError::AdmissionRejected { retry_after, .. } = &self {
            // Round up so clients never retry inside the same window.
            let secs = retry_after.as_millis().div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
