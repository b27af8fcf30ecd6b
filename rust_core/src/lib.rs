//! Card Arb Core - price aggregation and cross-market arbitrage for Pokémon cards.
//!
//! This crate provides:
//! - Clients for pokemontcg.io (TCGplayer and Cardmarket prices) and PriceCharting
//! - A TTL cache with stale fallback in front of both providers
//! - Bounded retry with exponential backoff and a per-provider circuit breaker
//! - Fuzzy card matching across providers
//! - Price extraction and validation into integer-cent quotes
//! - The arbitrage engine and the lookup service that ties it all together

pub mod arbitrage;
pub mod cache;
pub mod circuit_breaker;
pub mod clients;
pub mod error;
pub mod lookup;
pub mod presentation;
pub mod pricing;
pub mod providers;
pub mod types;
pub mod utils;

pub use arbitrage::{analyze, find_opportunities, ArbitrageOpportunity, ArbitrageReport};
pub use cache::{CacheKind, CacheStats, CacheTtls, TtlCache};
pub use error::{LookupError, UpstreamError};
pub use lookup::{LookupService, ServiceStatus};
pub use pricing::PriceExtractor;
pub use providers::{CardCatalog, PriceGuide};
pub use types::*;
pub use utils::money::Money;
