//! Forwarding capability: sends a prepared request upstream and hands back the response
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, Request, Response},
};
use futures::TryStreamExt;
use http_body_util::BodyExt;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ProxyError;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Anything that can carry a request to the upstream and return its response.
///
/// The interceptor only depends on this trait, so tests can substitute a
/// recording implementation for the real HTTP client.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError>;
}

/// Forwards to a single upstream base URL over reqwest.
pub struct UpstreamForwarder {
    base_url: Url,
    client: reqwest::Client,
}

impl UpstreamForwarder {
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Self, ProxyError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url,
            client: builder.build()?,
        })
    }

    /// `<base path><request path>?<request query>`; the base URL's own query is dropped.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}{}", self.base_url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url.set_query(query);
        url
    }
}

#[async_trait]
impl Forward for UpstreamForwarder {
    async fn forward(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let (parts, body) = req.into_parts();
        let url = self.target_url(parts.uri.path(), parts.uri.query());
        info!("🔄 Forwarding {} to: {}", parts.method, url);

        let body = body
            .collect()
            .await
            .map_err(ProxyError::RequestBody)?
            .to_bytes();

        let mut upstream_req = self.client.request(parts.method, url).body(body);

        // content-length is recomputed by reqwest from the body
        for (key, value) in parts.headers.iter() {
            if *key == header::HOST || *key == header::CONTENT_LENGTH || is_hop_by_hop(key)
            {
                continue;
            }
            upstream_req = upstream_req.header(key, value);
        }

        let response = upstream_req.send().await?;
        debug!("✓ Received response headers from upstream");

        let mut builder = Response::builder().status(response.status());
        if let Some(headers) = builder.headers_mut() {
            copy_end_to_end(response.headers(), headers);
        }

        let stream = response
            .bytes_stream()
            .inspect_err(|e| warn!("⚠️  Upstream body stream error: {}", e));

        builder
            .body(Body::from_stream(stream))
            .map_err(|e| ProxyError::ResponseBuild(e.to_string()))
    }
}

fn copy_end_to_end(from: &HeaderMap, to: &mut HeaderMap) {
    for (key, value) in from.iter() {
        if !is_hop_by_hop(key) {
            to.append(key.clone(), value.clone());
        }
    }
}
