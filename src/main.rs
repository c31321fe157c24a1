use anyhow::Context;
use axum::serve;
use clap::Parser;
use llm_proxy::config::Cli;
use llm_proxy::proxy::{router, ProxyState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;

    // RUST_LOG wins over --verbose
    let default_filter = if config.verbose { "llm_proxy=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    info!("Starting LLM Proxy");
    info!("Listening on: {}", config.listen);
    info!("Proxying to: {}", config.base_url);
    for (from, to) in config.models.iter() {
        info!("  Model mapping: {} → {}", from, to);
    }
    info!("SSE snapshot filter enabled: {}", config.filter_snapshot);
    match config.timeout {
        Some(timeout) => info!("Upstream timeout: {:?}", timeout),
        None => info!("Upstream timeout: none"),
    }

    let state = ProxyState::from_config(&config).context("failed to build upstream client")?;
    let app = router(state);

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind to {}", config.listen))?;

    info!("LLM Proxy is ready");

    serve(listener, app).await.context("server error")?;
    Ok(())
}
