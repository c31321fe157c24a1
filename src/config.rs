// Command-line configuration
//
// Every flag except --model and --verbose can also come from the
// environment, which is how the proxy is usually configured in containers.

use clap::Parser;
use reqwest::Url;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::ConfigError;
use crate::remap::ModelMap;

/// Reverse proxy for LLM APIs with model remapping and SSE cleanup
#[derive(Parser, Debug)]
#[command(name = "llm-proxy")]
#[command(version)]
#[command(
    about = "Proxy LLM requests, remapping model names and filtering malformed SSE events",
    after_help = "Examples:\n   llm-proxy --base-url http://localhost:8081 --model model-alias=actual-model"
)]
pub struct Cli {
    /// Upstream base URL
    #[arg(long, env = "LLM_PROXY_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Remap a model name, can be repeated
    #[arg(long = "model", value_name = "FROM=TO")]
    pub models: Vec<String>,

    /// Port to listen on
    #[arg(long, env = "LLM_PROXY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to listen on
    #[arg(long, env = "LLM_PROXY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Drop `type: "text"` SSE events that carry a `snapshot` field
    #[arg(long, env = "LLM_PROXY_FILTER_SNAPSHOT")]
    pub filter_snapshot: bool,

    /// Total timeout for each upstream request, in seconds
    #[arg(long, env = "LLM_PROXY_TIMEOUT_SECS", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Show verbose info
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated startup configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub base_url: Url,
    pub models: ModelMap,
    pub listen: SocketAddr,
    pub filter_snapshot: bool,
    pub timeout: Option<Duration>,
    pub verbose: bool,
}

impl Cli {
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let base_url = parse_base_url(self.base_url.as_deref())?;
        let models = parse_model_mappings(&self.models)?;

        let host: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(self.host.clone()))?;

        Ok(ProxyConfig {
            base_url,
            models,
            listen: SocketAddr::new(host, self.port),
            filter_snapshot: self.filter_snapshot,
            timeout: self.timeout_secs.map(Duration::from_secs),
            verbose: self.verbose,
        })
    }
}

pub fn parse_base_url(raw: Option<&str>) -> Result<Url, ConfigError> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(ConfigError::MissingBaseUrl),
    };

    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedBaseUrl {
            url: raw.to_string(),
            reason: "scheme must be http or https",
        });
    }
    if url.host_str().is_none() {
        return Err(ConfigError::UnsupportedBaseUrl {
            url: raw.to_string(),
            reason: "missing host",
        });
    }
    Ok(url)
}

/// `FROM=TO` pairs, split on the first `=`.
pub fn parse_model_mappings<S: AsRef<str>>(raw: &[S]) -> Result<ModelMap, ConfigError> {
    let mut models = ModelMap::new();
    for mapping in raw {
        let mapping = mapping.as_ref();
        let (from, to) = mapping
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidModelMapping(mapping.to_string()))?;
        models.insert(from, to);
    }
    Ok(models)
}
