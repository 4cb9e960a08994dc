//! Cacheability policy.
//!
//! Decides, per incoming request, whether the cache path applies at all.
//! Requests that fail the policy bypass the cache subsystem entirely and
//! are forwarded to the origin untouched.

use axum::http::{Method, Request, header};

/// Whether a request is allowed to use the response cache.
///
/// Only GET and HEAD requests are cacheable. Requests carrying an
/// `authorization` or `cookie` header are treated as user-specific; their
/// responses must never be shared across users, so they bypass the cache
/// in both directions (no lookup, no store).
pub fn is_cacheable<B>(request: &Request<B>) -> bool {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return false;
    }

    let headers = request.headers();
    if headers.contains_key(header::AUTHORIZATION) || headers.contains_key(header::COOKIE) {
        return false;
    }

    true
}
