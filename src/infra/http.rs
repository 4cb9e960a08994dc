//! HTTP boundary.
//!
//! A single fallback route forwards every incoming request to the gateway;
//! there is no routing of its own. Synchronous gateway failures surface as
//! 502 with the error chain logged, never as a panic.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::cache::Gateway;

/// Shared state for the forwarding route.
#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<Gateway>,
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new().fallback(forward).with_state(state)
}

async fn forward(State(state): State<GatewayState>, request: Request<Body>) -> Response {
    match state.gateway.handle(request).await {
        Ok(response) => response,
        Err(err) => {
            error!(
                target = "staffetta::http",
                error = %err,
                "request failed before a response could be produced"
            );
            (StatusCode::BAD_GATEWAY, "origin unreachable").into_response()
        }
    }
}
