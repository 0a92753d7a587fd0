//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix (case-sensitive, on segment boundaries)
//! - Strip a matched prefix from a path
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/users` matches `/users` and `/users/…`, never `/usersettings`
//! - No regex to guarantee O(n) matching

use crate::config::validation::normalize_prefix;

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. Trailing slashes are ignored.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: normalize_prefix(prefix.as_ref()).to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if `path` starts with the prefix at a segment boundary.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Remainder of `path` after the prefix, always starting with `/`.
    /// Returns `None` when the path does not match.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if !self.matches(path) {
            return None;
        }
        if self.prefix == "/" {
            return Some(path);
        }
        let rest = &path[self.prefix.len()..];
        Some(if rest.is_empty() { "/" } else { rest })
    }
}
