//! Outbound requests to backend services.
//!
//! # Responsibilities
//! - Build the upstream request (rewritten URI, filtered headers)
//! - Send it over a pooled hyper client
//! - Abandon the call as soon as the cancellation token fires
//!
//! # Design Decisions
//! - One attempt per request, no retries
//! - Dropping the in-flight future releases its connection
//! - Connect failures are told apart from protocol failures

use std::net::IpAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, request::Parts, Request, Response},
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio_util::sync::CancellationToken;

use crate::routing::RouteEntry;
use crate::security::headers::{set_forwarded, strip_hop_by_hop};

/// Why a forwarding attempt produced no response.
#[derive(Debug)]
pub enum ForwardError {
    /// The cancellation token fired before the backend answered.
    Cancelled,
    /// TCP connection to the backend could not be established.
    Unreachable(hyper_util::client::legacy::Error),
    /// The connection failed after it was established.
    Protocol(hyper_util::client::legacy::Error),
}

/// Pooled HTTP/1.1 client for backend traffic.
#[derive(Clone, Debug)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
}

impl Upstream {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    /// Send `request` unless `token` is cancelled first.
    pub async fn send(
        &self,
        request: Request<Body>,
        token: &CancellationToken,
    ) -> Result<Response<Incoming>, ForwardError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ForwardError::Cancelled),
            result = self.client.request(request) => result.map_err(|e| {
                if e.is_connect() {
                    ForwardError::Unreachable(e)
                } else {
                    ForwardError::Protocol(e)
                }
            }),
        }
    }
}

/// Turn an inbound request into the request sent to `route`'s backend.
pub fn upstream_request(
    parts: Parts,
    body: Body,
    route: &RouteEntry,
    peer: Option<IpAddr>,
) -> Result<Request<Body>, axum::http::Error> {
    let uri = route.rewrite(&parts.uri)?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    let original_host = headers.get(header::HOST).cloned();
    set_forwarded(&mut headers, peer, original_host);
    if route.change_origin {
        headers.insert(header::HOST, route.host_header().clone());
    }

    let mut request = Request::builder().method(parts.method).uri(uri).body(body)?;
    *request.headers_mut() = headers;
    Ok(request)
}
