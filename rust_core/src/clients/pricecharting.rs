//! PriceCharting API client
//!
//! Authentication is the `t` query parameter. Product prices are integer
//! US cents. Failures can arrive as HTTP 200 with `"status": "error"`.

use super::{build_http_client, execute_with_retry, send_json, ClientSettings};
use crate::cache::{CacheKind, TtlCache};
use crate::circuit_breaker::ApiCircuitBreaker;
use crate::error::UpstreamError;
use crate::providers::{GuideProduct, PriceGuide, ProviderHealth};
use crate::types::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://www.pricecharting.com";

const PROVIDER: &str = "pricecharting";

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    products: Vec<GuideProduct>,
}

pub struct PriceChartingClient {
    client: Client,
    settings: ClientSettings,
    circuit_breaker: ApiCircuitBreaker,
    search_cache: TtlCache<Vec<GuideProduct>>,
    product_cache: TtlCache<GuideProduct>,
}

impl std::fmt::Debug for PriceChartingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceChartingClient")
            .field("base_url", &self.settings.base_url)
            .field("has_token", &self.settings.credential.is_some())
            .field("circuit_breaker_state", &self.circuit_breaker.state())
            .finish()
    }
}

impl PriceChartingClient {
    pub fn new(settings: ClientSettings) -> Result<Self, reqwest::Error> {
        let client = build_http_client(settings.timeout)?;
        if settings.credential.is_none() {
            warn!("PriceCharting API token is empty. PriceCharting lookups will fail.");
        }
        Ok(Self {
            client,
            circuit_breaker: ApiCircuitBreaker::new(PROVIDER, settings.breaker.clone()),
            settings,
            search_cache: TtlCache::new("pricecharting-search"),
            product_cache: TtlCache::new("pricecharting-product"),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}{}", self.settings.base_url, path);
        debug!("GET {} {:?}", url, params);

        let request = self
            .client
            .get(&url)
            .query(params)
            .query(&[("t", token)]);
        let body: Value = send_json(PROVIDER, request).await?;
        check_status(&body)?;
        serde_json::from_value(body).map_err(|e| UpstreamError::Decode {
            provider: PROVIDER,
            message: e.to_string(),
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T, UpstreamError> {
        // A missing token is a configuration problem, not an outage.
        let token = self
            .settings
            .credential
            .as_deref()
            .ok_or_else(|| UpstreamError::Unavailable {
                provider: PROVIDER,
                message: "API token not configured".to_string(),
            })?;

        let params = params.as_slice();
        self.circuit_breaker
            .call(execute_with_retry(
                || self.get_json(token, path, params),
                &self.settings.retry,
                operation,
            ))
            .await
    }
}

/// Map an in-band `{"status": "error", "error-message": ...}` body.
fn check_status(body: &Value) -> Result<(), UpstreamError> {
    if body.get("status").and_then(Value::as_str) != Some("error") {
        return Ok(());
    }

    let message = body
        .get("error-message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();

    let lower = message.to_lowercase();
    if lower.contains("no such") || lower.contains("not found") || lower.contains("no product") {
        Err(UpstreamError::not_found(format!("pricecharting product ({})", message)))
    } else if is_credential_error(&lower) {
        // A rejected token is our misconfiguration, not the user's query
        Err(UpstreamError::Unavailable {
            provider: PROVIDER,
            message: format!("credentials rejected: {}", message),
        })
    } else {
        Err(UpstreamError::MalformedQuery(message))
    }
}

fn is_credential_error(lower: &str) -> bool {
    ["token", "api key", "apikey", "unauthorized", "authenticat", "subscription"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[async_trait]
impl PriceGuide for PriceChartingClient {
    async fn search_products(&self, query: &str) -> Result<Vec<GuideProduct>, UpstreamError> {
        let key = format!("products:{}", query.to_lowercase());
        let ttl = self.settings.ttls.ttl(CacheKind::Search);
        self.search_cache
            .get_or_fetch(&key, ttl, || async {
                let response: ProductsResponse = self
                    .fetch(
                        "pricecharting product search",
                        "/api/products",
                        vec![("q", query.to_string())],
                    )
                    .await?;
                debug!("pricecharting search '{}' returned {} products", query, response.products.len());
                Ok(response.products)
            })
            .await
    }

    async fn get_product(&self, id: &str) -> Result<GuideProduct, UpstreamError> {
        let ttl = self.settings.ttls.ttl(CacheKind::Card);
        self.product_cache
            .get_or_fetch(id, ttl, || {
                self.fetch(
                    "pricecharting product",
                    "/api/product",
                    vec![("id", id.to_string())],
                )
            })
            .await
    }

    async fn get_product_by_upc(&self, upc: &str) -> Result<GuideProduct, UpstreamError> {
        let upc = upc.trim();
        if upc.is_empty() || !upc.chars().all(|c| c.is_ascii_digit()) {
            return Err(UpstreamError::MalformedQuery(format!("invalid UPC '{}'", upc)));
        }
        let ttl = self.settings.ttls.ttl(CacheKind::Card);
        self.product_cache
            .get_or_fetch(&format!("upc:{}", upc), ttl, || {
                self.fetch(
                    "pricecharting product by upc",
                    "/api/product",
                    vec![("upc", upc.to_string())],
                )
            })
            .await
    }

    async fn health(&self) -> ProviderHealth {
        let mut caches = BTreeMap::new();
        caches.insert("search".to_string(), self.search_cache.stats().await);
        caches.insert("product".to_string(), self.product_cache.stats().await);

        ProviderHealth {
            provider: Provider::PriceCharting,
            configured: self.settings.credential.is_some(),
            breaker: self.circuit_breaker.status(),
            caches,
        }
    }

    async fn purge_stale(&self, grace: Duration) -> usize {
        self.search_cache.purge_expired(grace).await + self.product_cache.purge_expired(grace).await
    }
}
