//! Cache key normalization.
//!
//! Derives the canonical lookup identity for a request: the original URI
//! with the method collapsed to GET and all headers discarded. HEAD and
//! GET responses for the same resource are treated as interchangeable, so
//! a HEAD request is served from (and populates) the same entry as a GET.

use std::fmt;

use axum::http::Request;

/// Canonical identity of a cacheable resource.
///
/// Two requests to the same URI always produce equal keys, regardless of
/// method (GET vs HEAD) or headers. The query string is part of the
/// identity; `/feed?page=1` and `/feed?page=2` are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    uri: String,
}

impl CacheKey {
    /// Normalize a request into its cache identity.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            uri: request.uri().to_string(),
        }
    }

    /// The normalized URI this key was derived from.
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}
