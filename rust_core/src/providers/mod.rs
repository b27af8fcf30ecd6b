//! Provider abstractions for the two upstream price sources.
//!
//! [`CardCatalog`] is the card metadata API (pokemontcg.io), whose card
//! records embed TCGplayer and Cardmarket price blocks. [`PriceGuide`] is the
//! collectibles price guide (PriceCharting). The lookup service only talks to
//! these traits, so tests can swap in fakes.

use crate::cache::CacheStats;
use crate::circuit_breaker::BreakerStatus;
use crate::error::UpstreamError;
use crate::types::Provider;
use crate::utils::matching::{split_product_name, MatchCandidate};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Card metadata provider (provider A)
#[async_trait]
pub trait CardCatalog: Send + Sync {
    /// Run a Lucene-style card search, e.g. `name:"Pikachu"`
    async fn search_cards(&self, query: &str) -> Result<Vec<CatalogCard>, UpstreamError>;

    /// Short autocomplete search (`name:*q*`)
    async fn suggest_cards(&self, partial: &str) -> Result<Vec<CatalogCard>, UpstreamError>;

    async fn get_card(&self, id: &str) -> Result<CatalogCard, UpstreamError>;

    /// All sets, newest first
    async fn list_sets(&self) -> Result<Vec<CatalogSet>, UpstreamError>;

    async fn get_set(&self, id: &str) -> Result<CatalogSet, UpstreamError>;

    async fn health(&self) -> ProviderHealth;

    /// Drop cache entries expired for longer than `grace`. Returns the count.
    async fn purge_stale(&self, _grace: Duration) -> usize {
        0
    }
}

/// Collectibles price guide (provider B)
#[async_trait]
pub trait PriceGuide: Send + Sync {
    /// Full-text product search
    async fn search_products(&self, query: &str) -> Result<Vec<GuideProduct>, UpstreamError>;

    async fn get_product(&self, id: &str) -> Result<GuideProduct, UpstreamError>;

    /// Product by barcode (digits only)
    async fn get_product_by_upc(&self, upc: &str) -> Result<GuideProduct, UpstreamError>;

    async fn health(&self) -> ProviderHealth;

    /// Drop cache entries expired for longer than `grace`. Returns the count.
    async fn purge_stale(&self, _grace: Duration) -> usize {
        0
    }
}

/// Breaker and cache state of one provider, reported by `/api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider: Provider,
    /// Whether credentials were supplied
    pub configured: bool,
    pub breaker: BreakerStatus,
    pub caches: BTreeMap<String, CacheStats>,
}

// ============================================================================
// Card catalog records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    pub set: CatalogSet,
    #[serde(default)]
    pub images: Option<CardImages>,
    #[serde(default)]
    pub tcgplayer: Option<TcgPlayerBlock>,
    #[serde(default)]
    pub cardmarket: Option<CardmarketBlock>,
}

impl MatchCandidate for CatalogCard {
    fn candidate_name(&self) -> &str {
        &self.name
    }

    fn candidate_set(&self) -> &str {
        &self.set.name
    }

    fn candidate_number(&self) -> Option<&str> {
        self.number.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub printed_total: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    /// `YYYY/MM/DD`
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Option<SetImages>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardImages {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetImages {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

/// TCGplayer prices (USD), keyed by variant label (`normal`, `holofoil`, ...)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcgPlayerBlock {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub prices: BTreeMap<String, TcgPlayerPrices>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcgPlayerPrices {
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub mid: Option<f64>,
    /// Reported upstream but never used
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub market: Option<f64>,
    #[serde(default)]
    pub direct_low: Option<f64>,
}

/// Cardmarket prices (EUR)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardmarketBlock {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub prices: CardmarketPrices,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardmarketPrices {
    #[serde(default, alias = "averagePrice")]
    pub average_sell_price: Option<f64>,
    #[serde(default)]
    pub low_price: Option<f64>,
    #[serde(default)]
    pub trend_price: Option<f64>,
}

// ============================================================================
// Price guide records
// ============================================================================

/// PriceCharting product. Prices are integer US cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideProduct {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "product-name")]
    pub product_name: String,
    /// e.g. `"Pokemon Base Set"`
    #[serde(rename = "console-name", default)]
    pub console_name: String,
    #[serde(rename = "loose-price", default)]
    pub loose_price: Option<i64>,
    #[serde(rename = "cib-price", default)]
    pub cib_price: Option<i64>,
    #[serde(rename = "new-price", default)]
    pub new_price: Option<i64>,
    #[serde(rename = "graded-price", default)]
    pub graded_price: Option<i64>,
}

impl GuideProduct {
    /// Matching view with the `#number` split out of the product name.
    pub fn candidate(&self) -> GuideCandidate<'_> {
        let (card_name, number) = split_product_name(&self.product_name);
        GuideCandidate {
            product: self,
            card_name,
            number,
        }
    }
}

/// A [`GuideProduct`] as seen by the matcher
#[derive(Debug, Clone)]
pub struct GuideCandidate<'a> {
    pub product: &'a GuideProduct,
    pub card_name: String,
    pub number: Option<String>,
}

impl MatchCandidate for GuideCandidate<'_> {
    fn candidate_name(&self) -> &str {
        &self.card_name
    }

    fn candidate_set(&self) -> &str {
        &self.product.console_name
    }

    fn candidate_number(&self) -> Option<&str> {
        self.number.as_deref()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Str(String),
        Num(u64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Str(s) => s,
        Repr::Num(n) => n.to_string(),
    })
}
