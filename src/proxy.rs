use axum::{
    body::Body,
    extract::State,
    http::{header, Request, Response},
    response::IntoResponse,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::forward::{Forward, UpstreamForwarder};
use crate::interceptor::RequestInterceptor;
use crate::postprocess::ResponsePostProcessor;

#[derive(Clone)]
pub struct ProxyState {
    pub interceptor: Arc<RequestInterceptor>,
    pub post_processor: ResponsePostProcessor,
}

impl ProxyState {
    pub fn new(interceptor: RequestInterceptor, post_processor: ResponsePostProcessor) -> Self {
        Self {
            interceptor: Arc::new(interceptor),
            post_processor,
        }
    }

    /// State wired to the real upstream described by `config`.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let forwarder = UpstreamForwarder::new(config.base_url.clone(), config.timeout)?;
        Ok(Self::with_forwarder(config, Arc::new(forwarder)))
    }

    pub fn with_forwarder(config: &ProxyConfig, forwarder: Arc<dyn Forward>) -> Self {
        Self::new(
            RequestInterceptor::new(Arc::new(config.models.clone()), forwarder),
            ResponsePostProcessor::new(config.filter_snapshot),
        )
    }
}

/// Every method and path goes through the proxy.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub async fn proxy_handler(State(state): State<ProxyState>, req: Request<Body>) -> Response<Body> {
    let span = info_span!("exchange", id = %Uuid::new_v4());
    async move {
        match handle(&state, req).await {
            Ok(resp) => resp,
            Err(e) => e.into_response(),
        }
    }
    .instrument(span)
    .await
}

async fn handle(state: &ProxyState, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
    let start = Instant::now();
    let method = req.method().clone();

    let resp = state.interceptor.intercept(req).await?;

    let content_length = resp
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    info!(
        "📬 Response: {}, ContentLength: {}, Duration: {:?}",
        resp.status(),
        content_length,
        start.elapsed()
    );

    state.post_processor.process(&method, resp).await
}
