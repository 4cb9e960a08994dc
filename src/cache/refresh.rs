//! Background refresh of cached entries.
//!
//! A refresh run fetches the origin, rejects non-2xx answers without
//! touching the store, stamps the new entry with the current time and
//! replaces the old entry in one put. The same entry construction is used
//! to populate the cache after a miss; only the trigger differs.
//!
//! The cycle itself returns a `Result` so its outcomes are directly
//! assertable; only the detached submission points swallow failures, since
//! nothing client-facing is left to report them to.

use std::sync::Arc;

use axum::http::{HeaderValue, Request, Response, StatusCode};
use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::infra::origin::{Origin, OriginError};
use crate::infra::tasks::TaskScheduler;

use super::freshness::{LAST_REFRESH, now_unix_ms};
use super::key::CacheKey;
use super::store::{CachedEntry, ResponseStore};

const METRIC_REFRESH_TOTAL: &str = "staffetta_refresh_total";
const METRIC_REFRESH_FAILURE_TOTAL: &str = "staffetta_refresh_failure_total";

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("origin fetch failed: {0}")]
    Origin(#[from] OriginError),
    #[error("origin answered {status}, existing entry kept")]
    OriginStatus { status: StatusCode },
}

/// Build a storable entry from a successful origin response.
///
/// Copies status and headers, overwrites `x-last-refresh` with the refresh
/// time and captures the buffered body.
pub(crate) fn stamped_entry(response: &Response<Bytes>, refreshed_at_ms: u64) -> CachedEntry {
    let mut headers = response.headers().clone();
    headers.insert(LAST_REFRESH, HeaderValue::from(refreshed_at_ms));
    CachedEntry::new(response.status(), &headers, response.body().clone())
}

/// One full fetch-and-replace cycle.
///
/// A failing or non-2xx origin leaves the store untouched; a previously
/// good entry must never be clobbered by an error response.
pub(crate) async fn refresh(
    origin: Arc<dyn Origin>,
    store: Arc<dyn ResponseStore>,
    request: Request<Bytes>,
    key: CacheKey,
) -> Result<(), RefreshError> {
    let response = origin.fetch(request).await?;

    if !response.status().is_success() {
        return Err(RefreshError::OriginStatus {
            status: response.status(),
        });
    }

    let entry = stamped_entry(&response, now_unix_ms());
    store.put(key, entry).await;
    Ok(())
}

/// Submit a detached staleness-triggered refresh.
///
/// The triggering request has already been answered from cache; whatever
/// happens here must never surface into a response path.
pub(crate) fn spawn_refresh(
    tasks: &dyn TaskScheduler,
    origin: Arc<dyn Origin>,
    store: Arc<dyn ResponseStore>,
    request: Request<Bytes>,
    key: CacheKey,
) {
    tasks.submit(Box::pin(async move {
        counter!(METRIC_REFRESH_TOTAL).increment(1);
        match refresh(origin, store, request, key.clone()).await {
            Ok(()) => {
                debug!(
                    target = "staffetta::cache",
                    key = %key,
                    "refreshed stale entry"
                );
            }
            Err(error) => {
                counter!(METRIC_REFRESH_FAILURE_TOTAL).increment(1);
                warn!(
                    target = "staffetta::cache",
                    key = %key,
                    error = %error,
                    "background refresh failed, serving stale until next attempt"
                );
            }
        }
    }));
}

/// Submit a detached first-time population after a cache miss.
///
/// The entry was already constructed from the response handed to the
/// caller; only the store write runs detached.
pub(crate) fn spawn_populate(
    tasks: &dyn TaskScheduler,
    store: Arc<dyn ResponseStore>,
    key: CacheKey,
    entry: CachedEntry,
) {
    tasks.submit(Box::pin(async move {
        store.put(key.clone(), entry).await;
        debug!(
            target = "staffetta::cache",
            key = %key,
            "populated entry after miss"
        );
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{HeaderMap, Method};
    use std::sync::Mutex;

    use crate::cache::store::MemoryStore;

    struct StaticOrigin {
        response: Mutex<Option<Result<Response<Bytes>, OriginError>>>,
    }

    impl StaticOrigin {
        fn ok(status: StatusCode, body: &'static str) -> Arc<Self> {
            let response = Response::builder()
                .status(status)
                .header("content-type", "text/plain")
                .body(Bytes::from_static(body.as_bytes()))
                .unwrap();
            Arc::new(Self {
                response: Mutex::new(Some(Ok(response))),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(Err(OriginError::Transport(
                    "connection refused".to_string(),
                )))),
            })
        }
    }

    #[async_trait]
    impl Origin for StaticOrigin {
        async fn fetch(&self, _request: Request<Bytes>) -> Result<Response<Bytes>, OriginError> {
            self.response
                .lock()
                .unwrap()
                .take()
                .expect("origin fetched more than once")
        }
    }

    fn request(uri: &str) -> Request<Bytes> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
    }

    #[tokio::test]
    async fn successful_refresh_replaces_the_entry() {
        let request = request("/posts/hello");
        let key = CacheKey::from_request(&request);
        let store = Arc::new(MemoryStore::new());
        store
            .put(
                key.clone(),
                CachedEntry::new(StatusCode::OK, &HeaderMap::new(), Bytes::from_static(b"old")),
            )
            .await;
        let origin = StaticOrigin::ok(StatusCode::OK, "new");

        let before = now_unix_ms();
        refresh(origin, store.clone(), request, key.clone())
            .await
            .expect("refresh should succeed");

        let entry = store.lookup(&key).await.unwrap();
        assert_eq!(entry.body().as_ref(), b"new");
        assert!(entry.last_refresh_ms().unwrap() >= before);
    }

    #[tokio::test]
    async fn non_success_response_keeps_the_existing_entry() {
        let request = request("/posts/hello");
        let key = CacheKey::from_request(&request);
        let store = Arc::new(MemoryStore::new());
        let existing =
            CachedEntry::new(StatusCode::OK, &HeaderMap::new(), Bytes::from_static(b"good"));
        store.put(key.clone(), existing.clone()).await;
        let origin = StaticOrigin::ok(StatusCode::INTERNAL_SERVER_ERROR, "boom");

        let result = refresh(origin, store.clone(), request, key.clone()).await;

        assert!(matches!(
            result,
            Err(RefreshError::OriginStatus { status }) if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert_eq!(store.lookup(&key).await, Some(existing));
    }

    #[tokio::test]
    async fn transport_failure_keeps_the_existing_entry() {
        let request = request("/posts/hello");
        let key = CacheKey::from_request(&request);
        let store = Arc::new(MemoryStore::new());
        let existing =
            CachedEntry::new(StatusCode::OK, &HeaderMap::new(), Bytes::from_static(b"good"));
        store.put(key.clone(), existing.clone()).await;
        let origin = StaticOrigin::failing();

        let result = refresh(origin, store.clone(), request, key.clone()).await;

        assert!(matches!(result, Err(RefreshError::Origin(_))));
        assert_eq!(store.lookup(&key).await, Some(existing));
    }

    #[test]
    fn stamped_entry_overwrites_a_prior_stamp() {
        let response = Response::builder()
            .status(StatusCode::OK)
            .header("x-last-refresh", "1")
            .header("content-type", "text/plain")
            .body(Bytes::from_static(b"body"))
            .unwrap();

        let entry = stamped_entry(&response, 1_700_000_000_000);

        assert_eq!(entry.last_refresh_ms(), Some(1_700_000_000_000));
        assert_eq!(entry.status(), StatusCode::OK);
        assert_eq!(entry.body().as_ref(), b"body");
    }
}
