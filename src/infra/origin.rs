//! Origin fetch capability.
//!
//! The gateway never talks to the network directly; it consumes the
//! [`Origin`] trait with fully buffered request and response bodies, so a
//! response can be handed to the caller and persisted without re-reading
//! a stream. [`HttpOrigin`] is the production implementation, forwarding
//! to the configured upstream base URL.

use async_trait::async_trait;
use axum::http::{Request, Response, header};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::config::OriginSettings;

use super::error::InfraError;

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("origin request failed: {0}")]
    Transport(String),
    #[error("invalid origin target for `{path}`: {reason}")]
    Target { path: String, reason: String },
    #[error("failed to read origin response body: {0}")]
    Body(String),
}

/// Opaque fetch capability consumed by the delivery path.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch(&self, request: Request<Bytes>) -> Result<Response<Bytes>, OriginError>;
}

/// Forwards requests to the configured origin server.
pub struct HttpOrigin {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpOrigin {
    pub fn new(settings: &OriginSettings) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| InfraError::origin_client(err.to_string()))?;

        Ok(Self {
            base_url: settings.base_url.clone(),
            client,
        })
    }

    /// Rebase the incoming request's path and query onto the origin.
    fn target_for<B>(&self, request: &Request<B>) -> Result<Url, OriginError> {
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or("/");

        let joined = format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            path_and_query
        );

        Url::parse(&joined).map_err(|err| OriginError::Target {
            path: path_and_query.to_string(),
            reason: err.to_string(),
        })
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, request: Request<Bytes>) -> Result<Response<Bytes>, OriginError> {
        let target = self.target_for(&request)?;
        let (parts, body) = request.into_parts();

        // The host header belongs to this gateway, not the origin.
        let mut forwarded = parts.headers;
        forwarded.remove(header::HOST);

        let mut upstream = self
            .client
            .request(parts.method, target)
            .headers(forwarded);
        if !body.is_empty() {
            upstream = upstream.body(body);
        }

        let answer = upstream
            .send()
            .await
            .map_err(|err| OriginError::Transport(err.to_string()))?;

        let status = answer.status();
        let headers = answer.headers().clone();
        let bytes = answer
            .bytes()
            .await
            .map_err(|err| OriginError::Body(err.to_string()))?;

        let mut response = Response::new(bytes);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn origin(base: &str) -> HttpOrigin {
        let settings = OriginSettings {
            base_url: Url::parse(base).unwrap(),
            request_timeout: Duration::from_secs(5),
        };
        HttpOrigin::new(&settings).unwrap()
    }

    fn request(uri: &str) -> Request<Bytes> {
        Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    #[test]
    fn target_keeps_path_and_query() {
        let origin = origin("http://origin.internal:8080");
        let target = origin.target_for(&request("/posts/hello?page=2")).unwrap();
        assert_eq!(
            target.as_str(),
            "http://origin.internal:8080/posts/hello?page=2"
        );
    }

    #[test]
    fn trailing_slash_on_base_does_not_double_up() {
        let origin = origin("http://origin.internal:8080/");
        let target = origin.target_for(&request("/feed")).unwrap();
        assert_eq!(target.as_str(), "http://origin.internal:8080/feed");
    }

    #[test]
    fn empty_path_falls_back_to_root() {
        let origin = origin("http://origin.internal:8080");
        let target = origin.target_for(&request("/")).unwrap();
        assert_eq!(target.as_str(), "http://origin.internal:8080/");
    }
}
