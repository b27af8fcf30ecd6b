//! HTTP clients for the upstream price providers.

pub mod pokemon_tcg;
pub mod pricecharting;
pub mod retry;

pub use pokemon_tcg::PokemonTcgClient;
pub use pricecharting::PriceChartingClient;
pub use retry::{execute_with_retry, RetryPolicy};

use crate::cache::CacheTtls;
use crate::circuit_breaker::ApiCircuitBreakerConfig;
use crate::error::UpstreamError;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Connection, retry and caching settings shared by both clients
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    /// API key (pokemontcg.io) or token (PriceCharting)
    pub credential: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub ttls: CacheTtls,
    pub breaker: ApiCircuitBreakerConfig,
}

impl ClientSettings {
    pub fn new(base_url: &str, credential: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: credential.filter(|c| !c.trim().is_empty()),
            timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            ttls: CacheTtls::default(),
            breaker: ApiCircuitBreakerConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn with_breaker(mut self, breaker: ApiCircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("card-arb/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Send a request and decode a JSON body, mapping failures to [`UpstreamError`].
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T, UpstreamError> {
    let response = request
        .send()
        .await
        .map_err(|e| UpstreamError::from_transport(provider, &e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!("{} returned HTTP {}", provider, status);
        return Err(UpstreamError::from_status(provider, status, &body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| UpstreamError::from_transport(provider, &e))
}
