//! pokemontcg.io v2 client
//!
//! Card records carry TCGplayer (USD) and Cardmarket (EUR) price blocks, so a
//! single card search yields two markets' prices.

use super::{build_http_client, execute_with_retry, send_json, ClientSettings};
use crate::cache::{CacheKind, TtlCache};
use crate::circuit_breaker::ApiCircuitBreaker;
use crate::error::UpstreamError;
use crate::providers::{CardCatalog, CatalogCard, CatalogSet, ProviderHealth};
use crate::types::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.pokemontcg.io/v2";

const PROVIDER: &str = "pokemontcg";
const SEARCH_PAGE_SIZE: u32 = 250;
const SUGGEST_PAGE_SIZE: u32 = 15;
const SET_PAGE_SIZE: u32 = 250;

/// `{"data": ...}` wrapper around single records
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Paged list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    total_count: Option<u32>,
}

pub struct PokemonTcgClient {
    client: Client,
    settings: ClientSettings,
    circuit_breaker: ApiCircuitBreaker,
    card_cache: TtlCache<CatalogCard>,
    search_cache: TtlCache<Vec<CatalogCard>>,
    set_list_cache: TtlCache<Vec<CatalogSet>>,
    set_cache: TtlCache<CatalogSet>,
}

impl std::fmt::Debug for PokemonTcgClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PokemonTcgClient")
            .field("base_url", &self.settings.base_url)
            .field("has_api_key", &self.settings.credential.is_some())
            .field("circuit_breaker_state", &self.circuit_breaker.state())
            .finish()
    }
}

impl PokemonTcgClient {
    pub fn new(settings: ClientSettings) -> Result<Self, reqwest::Error> {
        let client = build_http_client(settings.timeout)?;
        if settings.credential.is_none() {
            info!("No pokemontcg.io API key configured, using the anonymous rate limit");
        }
        Ok(Self {
            client,
            circuit_breaker: ApiCircuitBreaker::new(PROVIDER, settings.breaker.clone()),
            settings,
            card_cache: TtlCache::new("pokemontcg-card"),
            search_cache: TtlCache::new("pokemontcg-search"),
            set_list_cache: TtlCache::new("pokemontcg-sets"),
            set_cache: TtlCache::new("pokemontcg-set"),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}/{}", self.settings.base_url, path);
        debug!("GET {} {:?}", url, params);

        let mut request = self.client.get(&url).query(params);
        if let Some(key) = &self.settings.credential {
            request = request.header("X-Api-Key", key);
        }
        send_json(PROVIDER, request).await
    }

    /// One logical upstream call: retried, then accounted by the breaker.
    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T, UpstreamError> {
        let params = params.as_slice();
        self.circuit_breaker
            .call(execute_with_retry(
                || self.get_json(path, params),
                &self.settings.retry,
                operation,
            ))
            .await
    }

    async fn fetch_card_page(
        &self,
        operation: &str,
        params: Vec<(&str, String)>,
    ) -> Result<Vec<CatalogCard>, UpstreamError> {
        let page: Page<CatalogCard> = self.fetch(operation, "cards", params).await?;
        debug!(
            "{} returned {} of {} cards",
            operation,
            page.data.len(),
            page.total_count.unwrap_or_default()
        );
        Ok(page.data)
    }
}

/// Query parameters for a card search
fn search_params(query: &str, page_size: u32, order_by: &str) -> Vec<(&'static str, String)> {
    vec![
        ("q", query.to_string()),
        ("page", "1".to_string()),
        ("pageSize", page_size.to_string()),
        ("orderBy", order_by.to_string()),
    ]
}

/// Newest first; sets without a release date go last.
fn sort_sets_newest_first(sets: &mut [CatalogSet]) {
    sets.sort_by(|a, b| b.release_date.cmp(&a.release_date));
}

#[async_trait]
impl CardCatalog for PokemonTcgClient {
    async fn search_cards(&self, query: &str) -> Result<Vec<CatalogCard>, UpstreamError> {
        let key = format!("search:{}", query.to_lowercase());
        let ttl = self.settings.ttls.ttl(CacheKind::Search);
        self.search_cache
            .get_or_fetch(&key, ttl, || {
                self.fetch_card_page(
                    "pokemontcg card search",
                    search_params(query, SEARCH_PAGE_SIZE, "-set.releaseDate"),
                )
            })
            .await
    }

    async fn suggest_cards(&self, partial: &str) -> Result<Vec<CatalogCard>, UpstreamError> {
        let cleaned = partial.trim().replace(['"', '*'], "");
        let key = format!("suggest:{}", cleaned.to_lowercase());
        let ttl = self.settings.ttls.ttl(CacheKind::Search);
        let query = format!("name:*{}*", cleaned);
        self.search_cache
            .get_or_fetch(&key, ttl, || {
                self.fetch_card_page(
                    "pokemontcg suggestions",
                    search_params(&query, SUGGEST_PAGE_SIZE, "name"),
                )
            })
            .await
    }

    async fn get_card(&self, id: &str) -> Result<CatalogCard, UpstreamError> {
        let ttl = self.settings.ttls.ttl(CacheKind::Card);
        self.card_cache
            .get_or_fetch(id, ttl, || async {
                let path = format!("cards/{}", id);
                let envelope: Envelope<CatalogCard> = self
                    .fetch("pokemontcg card", &path, Vec::new())
                    .await
                    .map_err(|e| match e {
                        UpstreamError::NotFound { .. } => {
                            UpstreamError::not_found(format!("card {}", id))
                        }
                        other => other,
                    })?;
                Ok(envelope.data)
            })
            .await
    }

    async fn list_sets(&self) -> Result<Vec<CatalogSet>, UpstreamError> {
        let ttl = self.settings.ttls.ttl(CacheKind::Set);
        self.set_list_cache
            .get_or_fetch("sets", ttl, || async {
                let params = vec![
                    ("pageSize", SET_PAGE_SIZE.to_string()),
                    ("orderBy", "-releaseDate".to_string()),
                ];
                let page: Page<CatalogSet> = self.fetch("pokemontcg sets", "sets", params).await?;
                let mut sets = page.data;
                sort_sets_newest_first(&mut sets);
                Ok(sets)
            })
            .await
    }

    async fn get_set(&self, id: &str) -> Result<CatalogSet, UpstreamError> {
        let ttl = self.settings.ttls.ttl(CacheKind::Set);
        self.set_cache
            .get_or_fetch(id, ttl, || async {
                let path = format!("sets/{}", id);
                let envelope: Envelope<CatalogSet> = self
                    .fetch("pokemontcg set", &path, Vec::new())
                    .await
                    .map_err(|e| match e {
                        UpstreamError::NotFound { .. } => {
                            UpstreamError::not_found(format!("set {}", id))
                        }
                        other => other,
                    })?;
                Ok(envelope.data)
            })
            .await
    }

    async fn health(&self) -> ProviderHealth {
        let mut caches = BTreeMap::new();
        caches.insert("card".to_string(), self.card_cache.stats().await);
        caches.insert("search".to_string(), self.search_cache.stats().await);
        caches.insert("sets".to_string(), self.set_list_cache.stats().await);
        caches.insert("set".to_string(), self.set_cache.stats().await);

        ProviderHealth {
            provider: Provider::PokemonTcg,
            configured: self.settings.credential.is_some(),
            breaker: self.circuit_breaker.status(),
            caches,
        }
    }

    async fn purge_stale(&self, grace: Duration) -> usize {
        self.card_cache.purge_expired(grace).await
            + self.search_cache.purge_expired(grace).await
            + self.set_list_cache.purge_expired(grace).await
            + self.set_cache.purge_expired(grace).await
    }
}
