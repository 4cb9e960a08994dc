//! Per-request delivery path.
//!
//! Ties policy, key normalization, freshness and refresh together:
//!
//! ```text
//! request → cacheable? ─no→ fetch origin, return verbatim
//!    │yes
//!    └→ lookup → fresh  → serve cached entry
//!              → stale  → serve cached entry + detached refresh
//!              → miss   → fetch origin, return it + detached populate
//! ```
//!
//! Every path returns exactly one response. Background work is submitted
//! to the task scheduler and never awaited by the request that spawned it.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::infra::origin::{Origin, OriginError};
use crate::infra::tasks::TaskScheduler;

use super::freshness::{self, Freshness};
use super::key::CacheKey;
use super::policy;
use super::refresh;
use super::store::ResponseStore;

const METRIC_CACHE_HIT_TOTAL: &str = "staffetta_cache_hit_total";
const METRIC_CACHE_STALE_TOTAL: &str = "staffetta_cache_stale_total";
const METRIC_CACHE_MISS_TOTAL: &str = "staffetta_cache_miss_total";
const METRIC_CACHE_BYPASS_TOTAL: &str = "staffetta_cache_bypass_total";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("origin fetch failed: {0}")]
    Origin(#[from] OriginError),
    #[error("failed to buffer request body: {0}")]
    RequestBody(String),
}

/// The stale-while-revalidate orchestrator.
///
/// Owns no state of its own; the store, origin and scheduler are injected
/// capabilities shared across all concurrent requests.
pub struct Gateway {
    origin: Arc<dyn Origin>,
    store: Arc<dyn ResponseStore>,
    tasks: Arc<dyn TaskScheduler>,
}

impl Gateway {
    pub fn new(
        origin: Arc<dyn Origin>,
        store: Arc<dyn ResponseStore>,
        tasks: Arc<dyn TaskScheduler>,
    ) -> Self {
        Self {
            origin,
            store,
            tasks,
        }
    }

    /// Answer one request.
    ///
    /// Synchronous origin failures (bypass and cold miss) propagate to the
    /// caller; there is nothing cached to fall back on. Failures inside
    /// scheduled background work never reach this result.
    #[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
    pub async fn handle(&self, request: Request<Body>) -> Result<Response<Body>, GatewayError> {
        let request = buffer_request(request).await?;

        if !policy::is_cacheable(&request) {
            counter!(METRIC_CACHE_BYPASS_TOTAL).increment(1);
            debug!(
                target = "staffetta::gateway",
                outcome = "bypass",
                "forwarding request untouched"
            );
            let response = self.origin.fetch(request).await?;
            return Ok(into_client_response(response));
        }

        let key = CacheKey::from_request(&request);

        if let Some(entry) = self.store.lookup(&key).await {
            let verdict = freshness::evaluate(&entry, freshness::now_unix_ms());
            return Ok(match verdict {
                Freshness::Fresh => {
                    counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                    debug!(
                        target = "staffetta::gateway",
                        outcome = "hit",
                        key = %key,
                        "serving fresh entry"
                    );
                    entry.into_response()
                }
                Freshness::Stale => {
                    counter!(METRIC_CACHE_STALE_TOTAL).increment(1);
                    debug!(
                        target = "staffetta::gateway",
                        outcome = "stale",
                        key = %key,
                        "serving stale entry, refresh scheduled"
                    );
                    refresh::spawn_refresh(
                        self.tasks.as_ref(),
                        self.origin.clone(),
                        self.store.clone(),
                        request,
                        key,
                    );
                    entry.into_response()
                }
            });
        }

        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
        debug!(
            target = "staffetta::gateway",
            outcome = "miss",
            key = %key,
            "fetching origin"
        );

        // The caller has nothing to fall back on, so this fetch is the one
        // place the request waits on the origin.
        let response = self.origin.fetch(request).await?;

        if response.status().is_success() {
            let entry = refresh::stamped_entry(&response, freshness::now_unix_ms());
            refresh::spawn_populate(self.tasks.as_ref(), self.store.clone(), key, entry);
        }

        Ok(into_client_response(response))
    }
}

async fn buffer_request(request: Request<Body>) -> Result<Request<Bytes>, GatewayError> {
    let (parts, body) = request.into_parts();
    let bytes = BodyExt::collect(body)
        .await
        .map_err(|error| GatewayError::RequestBody(error.to_string()))?
        .to_bytes();
    Ok(Request::from_parts(parts, bytes))
}

fn into_client_response(response: Response<Bytes>) -> Response<Body> {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::from(body))
}
