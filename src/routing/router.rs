//! Route lookup and path rewriting.
//!
//! # Responsibilities
//! - Store compiled routes in declaration order
//! - Look up the matching route for a path
//! - Rewrite the request URI for the selected backend
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - First match in declaration order wins
//! - Explicit no-match rather than silent default

use axum::http::{
    uri::{Authority, PathAndQuery, Scheme},
    HeaderValue, Uri,
};
use url::Url;

use crate::config::RouteConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// Error building the route table.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route {prefix:?}: invalid target {target:?}: {reason}")]
    InvalidTarget {
        prefix: String,
        target: String,
        reason: String,
    },
}

/// A compiled route: prefix → backend base URL plus rewrite rules.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub name: String,
    matcher: PathPrefixMatcher,
    target: String,
    authority: Authority,
    host_header: HeaderValue,
    base_path: String,
    pub strip_prefix: bool,
    pub change_origin: bool,
}

impl RouteEntry {
    pub fn from_config(config: &RouteConfig) -> Result<Self, RouteError> {
        let invalid = |reason: String| RouteError::InvalidTarget {
            prefix: config.prefix.clone(),
            target: config.target.clone(),
            reason,
        };

        let url = Url::parse(&config.target).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host".to_string()))?;
        let authority_str = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority: Authority = authority_str
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| invalid(e.to_string()))?;
        let host_header =
            HeaderValue::from_str(authority.as_str()).map_err(|e| invalid(e.to_string()))?;

        let matcher = PathPrefixMatcher::new(&config.prefix);
        Ok(Self {
            name: config.name.clone().unwrap_or_else(|| matcher.prefix().to_string()),
            matcher,
            target: config.target.clone(),
            authority,
            host_header,
            base_path: url.path().trim_end_matches('/').to_string(),
            strip_prefix: config.strip_prefix,
            change_origin: config.change_origin,
        })
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// Target base URL as configured.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Value for the outbound `Host` header when `change_origin` is set.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_header
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    /// Path sent to the backend, before the base path is prepended.
    pub fn forwarded_path<'a>(&self, path: &'a str) -> &'a str {
        if self.strip_prefix {
            self.matcher.strip(path).unwrap_or(path)
        } else {
            path
        }
    }

    /// Absolute URI of the backend resource for an inbound URI.
    pub fn rewrite(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let mut path_and_query = format!("{}{}", self.base_path, self.forwarded_path(uri.path()));
        if let Some(query) = uri.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query.parse::<PathAndQuery>()?)
            .build()
    }
}

/// Ordered route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    /// Compile routes, keeping declaration order.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, RouteError> {
        let routes = configs
            .iter()
            .map(RouteEntry::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        for route in &routes {
            tracing::debug!(
                route = %route.name,
                prefix = %route.prefix(),
                target = %route.target(),
                strip_prefix = route.strip_prefix,
                "Route registered"
            );
        }

        Ok(Self { routes })
    }

    /// First route whose prefix matches `path`, or `None`.
    pub fn resolve(&self, path: &str) -> Option<&RouteEntry> {
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.iter()
    }
}
