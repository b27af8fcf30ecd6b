//! Request-scoped card lookup: fan out to both providers, match, extract
//! prices and run the arbitrage engine.

use crate::arbitrage::{analyze, ArbitrageReport};
use crate::error::{LookupError, UpstreamError};
use crate::pricing::PriceExtractor;
use crate::providers::{CardCatalog, CatalogCard, CatalogSet, GuideCandidate, GuideProduct, PriceGuide, ProviderHealth};
use crate::types::{CardQuery, CardRecord, Provider};
use crate::utils::matching::{best_match, normalize_set};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Shortest partial name worth an autocomplete search
pub const MIN_SUGGEST_LEN: usize = 3;

/// What one provider contributed to a lookup
#[derive(Debug)]
enum Outcome<T> {
    Matched(T),
    Absent,
    Failed(UpstreamError),
}

impl<T> Outcome<T> {
    fn from_search<R>(result: Result<R, UpstreamError>, pick: impl FnOnce(R) -> Option<T>) -> Self {
        match result {
            Ok(records) => pick(records).map_or(Outcome::Absent, Outcome::Matched),
            Err(UpstreamError::NotFound { .. }) => Outcome::Absent,
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Snapshot for `/api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub providers: Vec<ProviderHealth>,
    pub eur_to_usd_rate: f64,
}

#[derive(Clone)]
pub struct LookupService {
    catalog: Arc<dyn CardCatalog>,
    guide: Arc<dyn PriceGuide>,
    extractor: PriceExtractor,
}

impl LookupService {
    pub fn new(catalog: Arc<dyn CardCatalog>, guide: Arc<dyn PriceGuide>, extractor: PriceExtractor) -> Self {
        Self {
            catalog,
            guide,
            extractor,
        }
    }

    /// Compare one card's prices across all markets.
    pub async fn compare(&self, query: &CardQuery) -> Result<ArbitrageReport, LookupError> {
        query.validate().map_err(LookupError::MalformedQuery)?;

        let lookup_id = Uuid::new_v4();
        let span = info_span!("lookup", %lookup_id, card = %query.name.trim(), set = %query.set_name.trim());

        async {
            let catalog_query = catalog_search_query(query);
            let guide_query = guide_search_text(&query.name, &query.set_name);

            let (catalog_result, guide_result) = tokio::join!(
                self.catalog.search_cards(&catalog_query),
                self.guide.search_products(&guide_query)
            );

            let catalog = Outcome::from_search(catalog_result, |cards: Vec<CatalogCard>| {
                best_match(query, &cards).cloned()
            });
            let guide = Outcome::from_search(guide_result, |products| match_product(query, &products));

            self.combine(catalog, guide)
        }
        .instrument(span)
        .await
    }

    /// Prices for a catalog card id, joined with the price guide.
    pub async fn card_prices_by_id(&self, id: &str) -> Result<ArbitrageReport, LookupError> {
        if id.trim().is_empty() {
            return Err(LookupError::MalformedQuery("card id is required".to_string()));
        }

        let lookup_id = Uuid::new_v4();
        let span = info_span!("lookup", %lookup_id, card_id = %id);

        async {
            let card = match self.catalog.get_card(id).await {
                Ok(card) => card,
                Err(UpstreamError::NotFound { .. }) => return Err(LookupError::NotFound),
                Err(e) => return Err(e.into()),
            };

            let query = CardQuery::new(&card.name, &card.set.name, card.number.as_deref());
            let guide_result = self
                .guide
                .search_products(&guide_search_text(&card.name, &card.set.name))
                .await;
            let guide = Outcome::from_search(guide_result, |products| match_product(&query, &products));

            self.combine(Outcome::Matched(card), guide)
        }
        .instrument(span)
        .await
    }

    /// Prices for a PriceCharting product id, without a catalog join.
    pub async fn product_prices_by_id(&self, id: &str) -> Result<ArbitrageReport, LookupError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(LookupError::MalformedQuery("product id is required".to_string()));
        }
        let result = self.guide.get_product(id).await;
        self.product_report(result)
    }

    /// Prices for a product barcode, without a catalog join.
    pub async fn product_prices_by_upc(&self, upc: &str) -> Result<ArbitrageReport, LookupError> {
        let upc = upc.trim();
        if upc.is_empty() {
            return Err(LookupError::MalformedQuery("upc is required".to_string()));
        }
        let result = self.guide.get_product_by_upc(upc).await;
        self.product_report(result)
    }

    fn product_report(&self, result: Result<GuideProduct, UpstreamError>) -> Result<ArbitrageReport, LookupError> {
        let product = match result {
            Ok(product) => product,
            Err(UpstreamError::NotFound { .. }) => return Err(LookupError::NotFound),
            Err(UpstreamError::MalformedQuery(message)) => return Err(LookupError::MalformedQuery(message)),
            Err(e) => return Err(e.into()),
        };
        let quotes = self.extractor.guide_quotes(&product, Utc::now());
        debug!("Product {} has {} price points", product.id, quotes.len());
        Ok(analyze(guide_record(&product), quotes, Vec::new()))
    }

    /// Drop cache entries of both providers expired for longer than `grace`.
    pub async fn purge_caches(&self, grace: Duration) -> usize {
        let (catalog, guide) = tokio::join!(self.catalog.purge_stale(grace), self.guide.purge_stale(grace));
        catalog + guide
    }

    /// Autocomplete suggestions. Short input returns nothing.
    pub async fn search_cards(&self, partial: &str) -> Result<Vec<CatalogCard>, LookupError> {
        let partial = partial.trim();
        if partial.chars().count() < MIN_SUGGEST_LEN {
            return Ok(Vec::new());
        }
        Ok(self.catalog.suggest_cards(partial).await?)
    }

    pub async fn list_sets(&self) -> Result<Vec<CatalogSet>, LookupError> {
        Ok(self.catalog.list_sets().await?)
    }

    pub async fn get_set(&self, id: &str) -> Result<CatalogSet, LookupError> {
        match self.catalog.get_set(id).await {
            Ok(set) => Ok(set),
            Err(UpstreamError::NotFound { .. }) => Err(LookupError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn status(&self) -> ServiceStatus {
        let (catalog, guide) = tokio::join!(self.catalog.health(), self.guide.health());
        ServiceStatus {
            providers: vec![catalog, guide],
            eur_to_usd_rate: self.extractor.eur_to_usd_rate(),
        }
    }

    /// Apply the partial-failure policy and run the engine.
    fn combine(
        &self,
        catalog: Outcome<CatalogCard>,
        guide: Outcome<GuideProduct>,
    ) -> Result<ArbitrageReport, LookupError> {
        let observed_at = Utc::now();
        let mut notes = Vec::new();

        let (card, catalog_quotes) = match &catalog {
            Outcome::Matched(c) => (Some(catalog_record(c)), self.extractor.catalog_quotes(c, observed_at)),
            _ => (None, Vec::new()),
        };
        let (product_card, guide_quotes) = match &guide {
            Outcome::Matched(p) => (Some(guide_record(p)), self.extractor.guide_quotes(p, observed_at)),
            _ => (None, Vec::new()),
        };

        match (catalog, guide) {
            (Outcome::Failed(e), Outcome::Failed(other)) => {
                warn!("Both providers failed: {}; {}", e, other);
                Err(e.into())
            }
            (Outcome::Absent, Outcome::Absent) => {
                info!("Card not found on any provider");
                Err(LookupError::NotFound)
            }
            (Outcome::Failed(e), Outcome::Absent) | (Outcome::Absent, Outcome::Failed(e)) => {
                warn!("Card absent from one provider and the other failed: {}", e);
                Err(e.into())
            }
            (Outcome::Failed(e), Outcome::Matched(product)) => {
                warn!("{} failed, returning {} prices only: {}", Provider::PokemonTcg, Provider::PriceCharting, e);
                notes.push(format!("{} prices unavailable: {}", Provider::PokemonTcg, e));
                let card = product_card.unwrap_or_else(|| guide_record(&product));
                Ok(ArbitrageReport::without_pairing(card, guide_quotes, notes))
            }
            (Outcome::Matched(c), Outcome::Failed(e)) => {
                warn!("{} failed, returning {} prices only: {}", Provider::PriceCharting, Provider::PokemonTcg, e);
                notes.push(format!("{} prices unavailable: {}", Provider::PriceCharting, e));
                let card = card.unwrap_or_else(|| catalog_record(&c));
                Ok(ArbitrageReport::without_pairing(card, catalog_quotes, notes))
            }
            (catalog, guide) => {
                let mut record = match card {
                    Some(record) => record,
                    None => product_card.clone().ok_or(LookupError::NotFound)?,
                };
                if let Outcome::Matched(product) = &guide {
                    record = record.with_external_id(Provider::PriceCharting, &product.id);
                }
                if matches!(catalog, Outcome::Absent) {
                    notes.push(format!("card not found on {}", Provider::PokemonTcg));
                }
                if matches!(guide, Outcome::Absent) {
                    notes.push(format!("card not found on {}", Provider::PriceCharting));
                }

                let mut quotes = catalog_quotes;
                quotes.extend(guide_quotes);
                debug!("Analyzing {} price points", quotes.len());

                let report = analyze(record, quotes, notes);
                info!(
                    "Lookup complete: {} price points, {} opportunities",
                    report.price_points.len(),
                    report.opportunities.len()
                );
                Ok(report)
            }
        }
    }
}

/// pokemontcg.io query: exact name plus a prefix clause per set token, so
/// older printings of common names are not pushed off the first page.
fn catalog_search_query(query: &CardQuery) -> String {
    let mut clauses = vec![format!("name:\"{}\"", query.name.trim().replace('"', ""))];
    clauses.extend(
        normalize_set(&query.set_name)
            .split_whitespace()
            .map(|token| format!("set.name:{}*", token)),
    );
    clauses.join(" ")
}

/// PriceCharting full-text query. The `pokemon` qualifier keeps other
/// collectibles from outranking the card.
fn guide_search_text(name: &str, set_name: &str) -> String {
    format!("{} pokemon {}", name.trim(), set_name.trim())
}

fn match_product(query: &CardQuery, products: &[GuideProduct]) -> Option<GuideProduct> {
    let candidates: Vec<GuideCandidate<'_>> = products.iter().map(GuideProduct::candidate).collect();
    best_match(query, &candidates).map(|c| c.product.clone())
}

fn catalog_record(card: &CatalogCard) -> CardRecord {
    CardRecord::new(&card.name, &card.set.name, card.number.as_deref())
        .with_external_id(Provider::PokemonTcg, &card.id)
}

fn guide_record(product: &GuideProduct) -> CardRecord {
    let candidate = product.candidate();
    let set_name = product
        .console_name
        .strip_prefix("Pokemon ")
        .unwrap_or(&product.console_name);
    CardRecord::new(&candidate.card_name, set_name, candidate.number.as_deref())
        .with_external_id(Provider::PriceCharting, &product.id)
}
