//! Domain types shared by the clients, the arbitrage engine and the API.

use crate::utils::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Upstream data provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// pokemontcg.io card metadata API (carries TCGplayer and Cardmarket prices)
    PokemonTcg,
    /// PriceCharting collectibles pricing API
    PriceCharting,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::PokemonTcg => "pokemontcg",
            Provider::PriceCharting => "pricecharting",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market a price was observed on
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    TcgPlayer,
    Cardmarket,
    PriceCharting,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::TcgPlayer => "tcgplayer",
            PriceSource::Cardmarket => "cardmarket",
            PriceSource::PriceCharting => "pricecharting",
        }
    }

    /// Which upstream provider reports this market's prices
    pub fn provider(&self) -> Provider {
        match self {
            PriceSource::TcgPlayer | PriceSource::Cardmarket => Provider::PokemonTcg,
            PriceSource::PriceCharting => Provider::PriceCharting,
        }
    }

    /// Seller fee charged when selling on this market
    pub fn seller_fee_rate(&self) -> f64 {
        match self {
            PriceSource::TcgPlayer => 0.15,
            PriceSource::Cardmarket => 0.05,
            PriceSource::PriceCharting => 0.13,
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of price point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Market,
    Low,
    Mid,
    DirectLow,
    Trend,
    Average,
    /// Ungraded card
    Loose,
    /// Complete-in-box
    Cib,
    New,
    Graded,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Market => "market",
            PriceType::Low => "low",
            PriceType::Mid => "mid",
            PriceType::DirectLow => "direct_low",
            PriceType::Trend => "trend",
            PriceType::Average => "average",
            PriceType::Loose => "loose",
            PriceType::Cib => "cib",
            PriceType::New => "new",
            PriceType::Graded => "graded",
        }
    }

    /// Whether the price describes a typical raw-card sale and may be paired.
    ///
    /// `low` is often a single damaged listing; CIB, new and graded prices
    /// describe a different condition than a raw card.
    pub fn is_pairable(&self) -> bool {
        matches!(
            self,
            PriceType::Market
                | PriceType::Mid
                | PriceType::DirectLow
                | PriceType::Trend
                | PriceType::Average
                | PriceType::Loose
        )
    }
}

/// Printing of a card
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Normal,
    Holofoil,
    ReverseHolofoil,
    FirstEdition,
    FirstEditionHolofoil,
    Unlimited,
}

impl Variant {
    /// Map a provider's variant label (e.g. TCGplayer's `reverseHolofoil`,
    /// or a PriceCharting product name) to a printing.
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_lowercase();
        let holo = lower.contains("holo");
        let first = lower.contains("1st");
        if holo && lower.contains("reverse") {
            Variant::ReverseHolofoil
        } else if holo && first {
            Variant::FirstEditionHolofoil
        } else if holo {
            Variant::Holofoil
        } else if first {
            Variant::FirstEdition
        } else if lower.contains("unlimited") {
            Variant::Unlimited
        } else {
            Variant::Normal
        }
    }

    /// Two quotes are only comparable when they price the same printing.
    pub fn comparable_with(&self, other: &Variant) -> bool {
        self == other
    }
}

/// One observed price for a card. Immutable once fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub source: PriceSource,
    pub variant: Variant,
    pub price_type: PriceType,
    /// USD cents
    pub amount: Money,
    pub observed_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(
        source: PriceSource,
        variant: Variant,
        price_type: PriceType,
        amount: Money,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            variant,
            price_type,
            amount,
            observed_at,
        }
    }
}

/// User input for a single card lookup
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardQuery {
    pub name: String,
    #[serde(alias = "set")]
    pub set_name: String,
    #[serde(default)]
    pub number: Option<String>,
}

impl CardQuery {
    pub fn new(name: &str, set_name: &str, number: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            set_name: set_name.to_string(),
            number: number.map(str::to_string),
        }
    }

    /// Name and set must be present; the number is optional.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("card name is required".to_string());
        }
        if self.set_name.trim().is_empty() {
            return Err("set name is required".to_string());
        }
        Ok(())
    }

    /// Non-empty number, if given
    pub fn number(&self) -> Option<&str> {
        self.number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// A card identity joined across providers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub name: String,
    pub set_name: String,
    pub card_number: Option<String>,
    /// Provider -> that provider's id for this card
    pub external_ids: BTreeMap<Provider, String>,
}

impl CardRecord {
    pub fn new(name: &str, set_name: &str, card_number: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            set_name: set_name.to_string(),
            card_number: card_number.map(str::to_string),
            external_ids: BTreeMap::new(),
        }
    }

    pub fn with_external_id(mut self, provider: Provider, id: &str) -> Self {
        self.external_ids.insert(provider, id.to_string());
        self
    }
}
