//! Error types for startup configuration and for a single proxied exchange

use axum::{
    body::Body,
    http::{Response, StatusCode},
    response::IntoResponse,
};

/// Startup configuration problems. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing --base-url")]
    MissingBaseUrl,
    #[error("invalid --base-url: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid --base-url {url}: {reason}")]
    UnsupportedBaseUrl { url: String, reason: &'static str },
    #[error("invalid model mapping: {0}")]
    InvalidModelMapping(String),
    #[error("invalid listen address {0}")]
    InvalidListenAddr(String),
}

/// Errors that abort a proxied exchange
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("upstream request failed: {source}")]
    Upstream {
        #[source]
        source: reqwest::Error,
        timeout: bool,
    },
    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),
    #[error("failed to read upstream response body: {0}")]
    ResponseBody(#[source] axum::Error),
    #[error("failed to build response: {0}")]
    ResponseBuild(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(source: reqwest::Error) -> Self {
        let timeout = source.is_timeout();
        ProxyError::Upstream { source, timeout }
    }
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Upstream { timeout: true, .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream { .. } | ProxyError::ResponseBody(_) => StatusCode::BAD_GATEWAY,
            ProxyError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::ResponseBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response<Body> {
        let status = self.status();
        let message = self.to_string();

        tracing::error!("❌ Proxy error: {} - {}", status, message);

        Response::builder()
            .status(status)
            .body(Body::from(message))
            .unwrap_or_else(|_| Response::new(Body::from("Internal error building error response")))
    }
}
