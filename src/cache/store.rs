//! Cache storage.
//!
//! The store is an opaque key-value blob store from the delivery path's
//! point of view: whole entries go in under a [`CacheKey`], whole entries
//! come out. All mutation is a single atomic replace; there is no partial
//! update, so a reader never observes a half-written entry. Racing writes
//! for the same key apply in either order and the last writer wins.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use tokio::sync::RwLock;

use super::freshness::LAST_REFRESH;
use super::key::CacheKey;

/// A stored response: status, headers and a fully buffered body.
///
/// Entries are only ever constructed from successful (2xx) origin
/// responses; the delivery path enforces that invariant before any write.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedEntry {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let mut stored_headers = Vec::with_capacity(headers.len());
        for (name, value) in headers.iter() {
            stored_headers.push((name.clone(), value.clone()));
        }

        Self {
            status,
            headers: stored_headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Look up a header by name; first match wins.
    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(stored, _)| stored == name)
            .map(|(_, value)| value)
    }

    /// The `x-last-refresh` timestamp, when present and numeric.
    pub fn last_refresh_ms(&self) -> Option<u64> {
        self.header(&LAST_REFRESH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
    }

    /// Rebuild the stored response for delivery to a client.
    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.clear();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        response
    }
}

/// Storage capability consumed by the delivery path.
///
/// `put` is an atomic whole-entry replace. The trait is object-safe so the
/// gateway can be wired against any backend and tests can observe writes.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn lookup(&self, key: &CacheKey) -> Option<CachedEntry>;
    async fn put(&self, key: CacheKey, entry: CachedEntry);
}

/// In-process store backed by a map behind an async lock.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<CacheKey, CachedEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn lookup(&self, key: &CacheKey) -> Option<CachedEntry> {
        let guard = self.entries.read().await;
        guard.get(key).cloned()
    }

    async fn put(&self, key: CacheKey, entry: CachedEntry) {
        let mut guard = self.entries.write().await;
        guard.insert(key, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;

    fn key_for(uri: &str) -> CacheKey {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(())
            .unwrap();
        CacheKey::from_request(&request)
    }

    fn entry(body: &'static str) -> CachedEntry {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/html"));
        CachedEntry::new(StatusCode::OK, &headers, Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test]
    async fn lookup_on_empty_store_is_none() {
        let store = MemoryStore::new();
        assert!(store.lookup(&key_for("/")).await.is_none());
    }

    #[tokio::test]
    async fn put_then_lookup_round_trips() {
        let store = MemoryStore::new();
        let stored = entry("<html>hello</html>");

        store.put(key_for("/posts/hello"), stored.clone()).await;

        let found = store.lookup(&key_for("/posts/hello")).await;
        assert_eq!(found, Some(stored));
    }

    #[tokio::test]
    async fn put_replaces_the_whole_entry() {
        let store = MemoryStore::new();
        store.put(key_for("/"), entry("old")).await;
        store.put(key_for("/"), entry("new")).await;

        let found = store.lookup(&key_for("/")).await.unwrap();
        assert_eq!(found.body().as_ref(), b"new");
    }

    #[tokio::test]
    async fn into_response_preserves_status_headers_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        headers.insert(LAST_REFRESH, HeaderValue::from_static("1700000000000"));
        let stored = CachedEntry::new(StatusCode::OK, &headers, Bytes::from_static(b"body"));

        let response = stored.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/plain"
        );
        assert_eq!(
            response.headers().get("x-last-refresh").unwrap(),
            "1700000000000"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"body");
    }

    #[test]
    fn last_refresh_requires_a_numeric_value() {
        let mut headers = HeaderMap::new();
        headers.insert(LAST_REFRESH, HeaderValue::from_static("1700000000000"));
        let stored = CachedEntry::new(StatusCode::OK, &headers, Bytes::new());
        assert_eq!(stored.last_refresh_ms(), Some(1_700_000_000_000));

        let mut headers = HeaderMap::new();
        headers.insert(LAST_REFRESH, HeaderValue::from_static("soon"));
        let stored = CachedEntry::new(StatusCode::OK, &headers, Bytes::new());
        assert_eq!(stored.last_refresh_ms(), None);
    }
}
