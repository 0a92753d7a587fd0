//! Per-request admission and dispatch.
//!
//! ```text
//! Received ─▶ Rejected (429)
//!    │
//!    ▼
//! Admitted ─▶ RouteNotFound (404)
//!    │
//!    ▼
//! Routed ─▶ Forwarding ─▶ Completed (backend response)
//!                     ├─▶ TimedOut (504, backend call cancelled)
//!                     └─▶ BackendError (502)
//! ```
//!
//! The deadline is armed only once a route is found, right before the
//! outbound call starts.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::forward::{upstream_request, ForwardError, Upstream};
use crate::http::request::request_id;
use crate::http::response::relay;
use crate::observability::metrics;
use crate::resilience::timeouts::{Settlement, TimeoutGuard};
use crate::routing::{RouteEntry, RouteError, RouteTable};
use crate::security::identity::{peer_ip, ClientIdentity};
use crate::security::rate_limit::{Admission, FixedWindowLimiter};

/// Terminal state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Rejected,
    RouteNotFound,
    Completed,
    TimedOut,
    BackendError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Rejected => "rejected",
            Outcome::RouteNotFound => "route_not_found",
            Outcome::Completed => "completed",
            Outcome::TimedOut => "timed_out",
            Outcome::BackendError => "backend_error",
        }
    }

    fn of(error: &GatewayError) -> Self {
        match error {
            GatewayError::AdmissionRejected { .. } => Outcome::Rejected,
            GatewayError::RouteNotFound { .. } => Outcome::RouteNotFound,
            GatewayError::UpstreamTimeout { .. } => Outcome::TimedOut,
            GatewayError::UpstreamUnreachable { .. }
            | GatewayError::UpstreamProtocolError { .. }
            | GatewayError::InvalidUpstreamUri(_) => Outcome::BackendError,
        }
    }
}

/// An admitted request that is waiting on its backend.
#[derive(Debug, Clone)]
pub struct InFlightRequest {
    pub id: Uuid,
    pub request_id: String,
    pub client_id: String,
    pub path: String,
    pub route: String,
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

/// Removes its entry from the registry when the request ends, however
/// it ends.
struct InFlightGuard<'a> {
    registry: &'a DashMap<Uuid, InFlightRequest>,
    id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
        metrics::set_in_flight(self.registry.len());
    }
}

/// Request-scoped values shared by logging and metrics.
struct RequestContext {
    request_id: String,
    client_id: String,
    method: Method,
    path: String,
    start: Instant,
}

/// Orchestrates rate limiting, routing, deadlines and forwarding.
#[derive(Debug)]
pub struct Dispatcher {
    limiter: Option<Arc<FixedWindowLimiter>>,
    routes: RouteTable,
    guard: TimeoutGuard,
    upstream: Upstream,
    identity: ClientIdentity,
    in_flight: DashMap<Uuid, InFlightRequest>,
}

impl Dispatcher {
    pub fn new(
        routes: RouteTable,
        limiter: Option<Arc<FixedWindowLimiter>>,
        guard: TimeoutGuard,
        upstream: Upstream,
        identity: ClientIdentity,
    ) -> Self {
        Self {
            limiter,
            routes,
            guard,
            upstream,
            identity,
            in_flight: DashMap::new(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, RouteError> {
        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(FixedWindowLimiter::from_config(&config.rate_limit)));

        Ok(Self::new(
            RouteTable::from_config(&config.routes)?,
            limiter,
            TimeoutGuard::new(config.timeouts.request()),
            Upstream::new(config.timeouts.connect()),
            ClientIdentity::from_config(&config.client_identity),
        ))
    }

    pub fn limiter(&self) -> Option<&Arc<FixedWindowLimiter>> {
        self.limiter.as_ref()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Snapshot of admitted requests still waiting on a backend.
    pub fn in_flight_requests(&self) -> Vec<InFlightRequest> {
        self.in_flight.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Run one request through the pipeline. Always yields a response.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let ctx = RequestContext {
            request_id: request_id(&request),
            client_id: self.identity.resolve(&request),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            start: Instant::now(),
        };

        if let Err(err) = self.admit(&ctx.client_id) {
            metrics::record_rate_limited();
            return self.finish(&ctx, None, Err(err));
        }

        let Some(route) = self.routes.resolve(&ctx.path) else {
            let err = GatewayError::RouteNotFound { path: ctx.path.clone() };
            return self.finish(&ctx, None, Err(err));
        };

        let result = self.forward(request, route, &ctx).await;
        self.finish(&ctx, Some(route), result)
    }

    fn admit(&self, client_id: &str) -> Result<(), GatewayError> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        match limiter.admit(client_id) {
            Admission::Allowed { .. } => Ok(()),
            Admission::Rejected { count, retry_after } => Err(GatewayError::AdmissionRejected {
                client: client_id.to_string(),
                count,
                retry_after,
            }),
        }
    }

    async fn forward(
        &self,
        request: Request<Body>,
        route: &RouteEntry,
        ctx: &RequestContext,
    ) -> Result<Response, GatewayError> {
        let peer = peer_ip(&request);
        let (parts, body) = request.into_parts();
        let outbound = upstream_request(parts, body, route, peer)?;

        tracing::debug!(
            request_id = %ctx.request_id,
            route = %route.name,
            upstream = %outbound.uri(),
            "Forwarding request"
        );

        let token = CancellationToken::new();
        let id = Uuid::new_v4();
        self.in_flight.insert(
            id,
            InFlightRequest {
                id,
                request_id: ctx.request_id.clone(),
                client_id: ctx.client_id.clone(),
                path: ctx.path.clone(),
                route: route.name.clone(),
                deadline: Instant::now() + self.guard.duration(),
                cancel: token.clone(),
            },
        );
        metrics::set_in_flight(self.in_flight.len());
        let _registered = InFlightGuard {
            registry: &self.in_flight,
            id,
        };

        let deadline = self.guard.arm(token);
        let result = self.upstream.send(outbound, deadline.token()).await;

        match (deadline.cancel(), result) {
            (Settlement::TimedOut, _) | (_, Err(ForwardError::Cancelled)) => {
                metrics::record_timeout(&route.name);
                Err(GatewayError::UpstreamTimeout {
                    target: route.target().to_string(),
                    after: deadline.duration(),
                })
            }
            (Settlement::Completed, Ok(response)) => Ok(relay(response)),
            (Settlement::Completed, Err(ForwardError::Unreachable(source))) => {
                Err(GatewayError::UpstreamUnreachable {
                    target: route.target().to_string(),
                    source,
                })
            }
            (Settlement::Completed, Err(ForwardError::Protocol(source))) => {
                Err(GatewayError::UpstreamProtocolError {
                    target: route.target().to_string(),
                    source,
                })
            }
        }
    }

    fn finish(
        &self,
        ctx: &RequestContext,
        route: Option<&RouteEntry>,
        result: Result<Response, GatewayError>,
    ) -> Response {
        let route_name = route.map(|r| r.name.as_str()).unwrap_or("none");
        let elapsed_ms = ctx.start.elapsed().as_millis() as u64;

        let (outcome, response) = match result {
            Ok(response) => {
                tracing::info!(
                    request_id = %ctx.request_id,
                    client = %ctx.client_id,
                    method = %ctx.method,
                    path = %ctx.path,
                    route = %route_name,
                    status = response.status().as_u16(),
                    elapsed_ms,
                    "Request completed"
                );
                (Outcome::Completed, response)
            }
            Err(err) => {
                let outcome = Outcome::of(&err);
                match outcome {
                    Outcome::BackendError => tracing::error!(
                        request_id = %ctx.request_id,
                        client = %ctx.client_id,
                        route = %route_name,
                        error = %err,
                        elapsed_ms,
                        "Upstream request failed"
                    ),
                    _ => tracing::warn!(
                        request_id = %ctx.request_id,
                        client = %ctx.client_id,
                        method = %ctx.method,
                        path = %ctx.path,
                        route = %route_name,
                        kind = err.kind(),
                        error = %err,
                        elapsed_ms,
                        "Request rejected"
                    ),
                }
                (outcome, err.into_response())
            }
        };

        metrics::record_request(outcome.as_str(), response.status().as_u16(), route_name, ctx.start);
        response
    }
}
