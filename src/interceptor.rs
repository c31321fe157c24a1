//! Outbound request handling: buffer the body, remap the model, forward.
use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, Response},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ProxyError;
use crate::forward::Forward;
use crate::remap::{self, ModelMap};

pub struct RequestInterceptor {
    models: Arc<ModelMap>,
    forwarder: Arc<dyn Forward>,
}

impl RequestInterceptor {
    pub fn new(models: Arc<ModelMap>, forwarder: Arc<dyn Forward>) -> Self {
        Self { models, forwarder }
    }

    /// Forward `req`, rewriting its model name on the way when it qualifies.
    ///
    /// A body that cannot be read is not an error here: the request goes out
    /// without rewriting. Errors from the forwarder are returned untouched.
    pub async fn intercept(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let (mut parts, body) = req.into_parts();

        info!("📨 Request: {} {}", parts.method, parts.uri);
        debug!("Headers: {:?}", parts.headers);

        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("⚠️  Error reading request body, forwarding without rewrite: {}", e);
                parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0usize));
                parts.headers.remove(header::TRANSFER_ENCODING);
                return self
                    .forwarder
                    .forward(Request::from_parts(parts, Body::empty()))
                    .await;
            }
        };

        debug!("Body: {}", String::from_utf8_lossy(&body_bytes));

        let body_bytes = if parts.method == Method::POST {
            let content_type = parts
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let (rewritten, changed) = remap::remap(&body_bytes, content_type, &self.models);
            if changed {
                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
            }
            rewritten
        } else {
            body_bytes
        };

        self.forwarder
            .forward(Request::from_parts(parts, Body::from(body_bytes)))
            .await
    }
}
