//! Service configuration loaded from environment variables with defaults.

use card_arb_core::cache::CacheTtls;
use card_arb_core::clients::{pokemon_tcg, pricecharting, ClientSettings, RetryPolicy};
use std::env;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    // Credentials
    pub pokemon_tcg_api_key: Option<String>,
    pub pricecharting_api_token: Option<String>,

    // Upstreams
    pub pokemon_tcg_base_url: String,
    pub pricecharting_base_url: String,
    /// Per-request HTTP timeout (default: 15s)
    pub request_timeout_secs: u64,
    /// Attempts per upstream call, including the first (default: 3)
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,

    // Pricing
    /// Cardmarket EUR -> USD (default: 1.10)
    pub eur_to_usd_rate: f64,

    // Cache TTLs
    pub card_cache_ttl_secs: u64,
    pub set_cache_ttl_secs: u64,
    pub search_cache_ttl_secs: u64,
    /// How often expired entries are swept (default: 1h, 0 disables)
    pub cache_purge_interval_secs: u64,
    /// How long past expiry an entry stays as a stale fallback (default: 24h)
    pub cache_stale_grace_secs: u64,

    // HTTP surface
    pub bind_addr: String,
    pub cors_permissive: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_or = |key: &str, default: u64| -> u64 {
            lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        };
        let defaults = CacheTtls::default();

        Self {
            pokemon_tcg_api_key: lookup("POKEMON_TCG_API_KEY").filter(|v| !v.trim().is_empty()),
            pricecharting_api_token: lookup("PRICECHARTING_API_TOKEN")
                .filter(|v| !v.trim().is_empty()),

            pokemon_tcg_base_url: lookup("POKEMON_TCG_BASE_URL")
                .unwrap_or_else(|| pokemon_tcg::DEFAULT_BASE_URL.to_string()),
            pricecharting_base_url: lookup("PRICECHARTING_BASE_URL")
                .unwrap_or_else(|| pricecharting::DEFAULT_BASE_URL.to_string()),
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 15),
            max_retries: lookup("MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            retry_base_ms: parse_or("RETRY_BASE_MS", 200),
            retry_max_ms: parse_or("RETRY_MAX_MS", 5000),

            eur_to_usd_rate: lookup("EUR_TO_USD_RATE")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|rate| *rate > 0.0)
                .unwrap_or(1.10),

            card_cache_ttl_secs: parse_or("CARD_CACHE_TTL_SECS", defaults.card.as_secs()),
            set_cache_ttl_secs: parse_or("SET_CACHE_TTL_SECS", defaults.set.as_secs()),
            search_cache_ttl_secs: parse_or("SEARCH_CACHE_TTL_SECS", defaults.search.as_secs()),
            cache_purge_interval_secs: parse_or("CACHE_PURGE_INTERVAL_SECS", 3600),
            cache_stale_grace_secs: parse_or("CACHE_STALE_GRACE_SECS", 24 * 3600),

            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            cors_permissive: lookup("CORS_PERMISSIVE")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
        }
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            card: Duration::from_secs(self.card_cache_ttl_secs),
            set: Duration::from_secs(self.set_cache_ttl_secs),
            search: Duration::from_secs(self.search_cache_ttl_secs),
        }
    }

    /// Sweep period, `None` when purging is disabled.
    pub fn cache_purge_interval(&self) -> Option<Duration> {
        (self.cache_purge_interval_secs > 0).then(|| Duration::from_secs(self.cache_purge_interval_secs))
    }

    pub fn cache_stale_grace(&self) -> Duration {
        Duration::from_secs(self.cache_stale_grace_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_ms),
            Duration::from_millis(self.retry_max_ms),
        )
    }

    fn client_settings(&self, base_url: &str, credential: Option<String>) -> ClientSettings {
        ClientSettings::new(base_url, credential)
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_retry(self.retry_policy())
            .with_ttls(self.cache_ttls())
    }

    pub fn pokemon_tcg_settings(&self) -> ClientSettings {
        self.client_settings(&self.pokemon_tcg_base_url, self.pokemon_tcg_api_key.clone())
    }

    pub fn pricecharting_settings(&self) -> ClientSettings {
        self.client_settings(
            &self.pricecharting_base_url,
            self.pricecharting_api_token.clone(),
        )
    }

    /// Log current configuration at startup. Credentials are not printed.
    pub fn log_config(&self) {
        info!("Config loaded:");
        info!("  bind_addr: {}", self.bind_addr);
        info!(
            "  pokemon_tcg: {} (api key: {})",
            self.pokemon_tcg_base_url,
            if self.pokemon_tcg_api_key.is_some() { "set" } else { "not set" }
        );
        info!(
            "  pricecharting: {} (token: {})",
            self.pricecharting_base_url,
            if self.pricecharting_api_token.is_some() { "set" } else { "not set" }
        );
        info!("  request_timeout: {}s", self.request_timeout_secs);
        info!(
            "  retry: {} attempts, {}ms base, {}ms cap",
            self.max_retries, self.retry_base_ms, self.retry_max_ms
        );
        info!("  eur_to_usd_rate: {:.4}", self.eur_to_usd_rate);
        info!(
            "  cache ttl: card {}s, set {}s, search {}s",
            self.card_cache_ttl_secs, self.set_cache_ttl_secs, self.search_cache_ttl_secs
        );
        info!(
            "  cache purge: every {}s, stale grace {}s",
            self.cache_purge_interval_secs, self.cache_stale_grace_secs
        );
        info!("  cors_permissive: {}", self.cors_permissive);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
