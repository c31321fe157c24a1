//! Inbound response handling: SSE filtering for successful streams, buffering
//! and logging for error responses, and framing header fixups.
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Response, StatusCode},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use tracing::{debug, error, info};

use crate::error::ProxyError;
use crate::sse;

/// Matches `text/event-stream` bare or with parameters.
pub fn is_event_stream(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/event-stream")
}

/// Make the framing headers describe a fully buffered body of `len` bytes.
pub fn set_body_length(headers: &mut HeaderMap, len: usize) {
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.remove(header::TRANSFER_ENCODING);
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

async fn read_body(body: Body) -> Result<Bytes, ProxyError> {
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(ProxyError::ResponseBody)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsePostProcessor {
    filter_snapshot: bool,
}

impl ResponsePostProcessor {
    pub fn new(filter_snapshot: bool) -> Self {
        Self { filter_snapshot }
    }

    /// `method` is the method of the request that produced `resp`.
    pub async fn process(
        &self,
        method: &Method,
        resp: Response<Body>,
    ) -> Result<Response<Body>, ProxyError> {
        let status = resp.status();

        if status.is_success() {
            return self.process_success(resp).await;
        }
        if status.is_informational() {
            return Ok(resp);
        }

        let (mut parts, body) = resp.into_parts();
        let bytes = read_body(body).await?;

        error!(
            "❌ Upstream error response {}: {}",
            status,
            String::from_utf8_lossy(&bytes)
        );

        // HEAD replies and 304s carry the entity's length with no body
        if *method != Method::HEAD && status != StatusCode::NOT_MODIFIED {
            set_body_length(&mut parts.headers, bytes.len());
        }
        Ok(Response::from_parts(parts, Body::from(bytes)))
    }

    async fn process_success(&self, resp: Response<Body>) -> Result<Response<Body>, ProxyError> {
        if !self.filter_snapshot {
            return Ok(resp);
        }
        if !content_type(resp.headers()).is_some_and(is_event_stream) {
            return Ok(resp);
        }

        debug!("🌊 Buffering event stream for snapshot filtering");
        let (mut parts, body) = resp.into_parts();
        let bytes = read_body(body).await?;

        let (filtered, changed) = sse::filter_snapshot_events(&bytes);
        if changed {
            info!(
                "🧹 Event stream rewritten: {} → {} bytes",
                bytes.len(),
                filtered.len()
            );
            set_body_length(&mut parts.headers, filtered.len());
        }

        Ok(Response::from_parts(parts, Body::from(filtered)))
    }
}
