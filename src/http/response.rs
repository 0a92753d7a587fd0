//! Response handling and transformation.
//!
//! # Responsibilities
//! - Build the uniform `{ code, status, message, data }` envelope for
//!   locally generated responses
//! - Relay backend responses with hop-by-hop headers stripped
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Forwarded responses keep their status, headers and body

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hyper::body::Incoming;
use serde::Serialize;
use serde_json::Value;

use crate::security::headers::strip_hop_by_hop;

/// Outcome marker carried in the envelope's `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnvelopeStatus {
    Error,
    Success,
}

/// Body of every response the gateway produces itself.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub code: u16,
    pub status: EnvelopeStatus,
    pub message: String,
    pub data: Option<Value>,
}

impl Envelope {
    /// Error envelope with `data: null`.
    pub fn error(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_u16(),
            status: EnvelopeStatus::Error,
            message: message.into(),
            data: None,
        }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self)).into_response();
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

/// Turn a backend response into a client response, streaming the body.
pub fn relay(response: hyper::Response<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}
