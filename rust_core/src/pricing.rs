//! Turning provider payloads into validated [`PriceQuote`]s.

use crate::providers::{CardmarketBlock, CatalogCard, GuideProduct, TcgPlayerBlock};
use crate::types::{PriceQuote, PriceSource, PriceType, Variant};
use crate::utils::money::Money;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Prices above this are treated as listing errors
pub const MAX_VALID_PRICE: Money = Money::from_cents(100_000);

/// "Make offer" and out-of-stock placeholders: $0.01, $999.99, $9,999.99
const PLACEHOLDER_CENTS: [i64; 3] = [1, 99_999, 999_999];

pub const DEFAULT_EUR_TO_USD: f64 = 1.10;

/// Whether a price can take part in a comparison.
pub fn is_valid_price(amount: Money) -> bool {
    amount.is_positive()
        && !PLACEHOLDER_CENTS.contains(&amount.cents())
        && amount <= MAX_VALID_PRICE
}

fn check(amount: Money, label: &str) -> Option<Money> {
    if is_valid_price(amount) {
        Some(amount)
    } else {
        if amount.is_positive() {
            warn!("Rejecting placeholder or out-of-range price {} from {}", amount, label);
        }
        None
    }
}

/// Printing inferred from a PriceCharting product title.
pub fn infer_product_variant(product_name: &str) -> Variant {
    let lower = product_name.to_lowercase();
    if lower.contains("holo") && lower.contains("reverse") {
        Variant::ReverseHolofoil
    } else if lower.contains("holo") {
        Variant::Holofoil
    } else if lower.contains("1st edition") {
        Variant::FirstEdition
    } else {
        Variant::Normal
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PriceExtractor {
    eur_to_usd: f64,
}

impl Default for PriceExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_EUR_TO_USD)
    }
}

impl PriceExtractor {
    pub fn new(eur_to_usd: f64) -> Self {
        Self { eur_to_usd }
    }

    pub fn eur_to_usd_rate(&self) -> f64 {
        self.eur_to_usd
    }

    /// TCGplayer `market`, `low`, `mid` and `directLow` for every variant.
    /// `high` is never used.
    pub fn tcgplayer_quotes(&self, block: &TcgPlayerBlock, observed_at: DateTime<Utc>) -> Vec<PriceQuote> {
        let mut quotes = Vec::new();
        for (label, prices) in &block.prices {
            let variant = Variant::from_label(label);
            let points = [
                (PriceType::Market, prices.market),
                (PriceType::Low, prices.low),
                (PriceType::Mid, prices.mid),
                (PriceType::DirectLow, prices.direct_low),
            ];
            for (price_type, dollars) in points {
                let Some(dollars) = dollars else { continue };
                let label = format!("tcgplayer-{}-{}", label, price_type.as_str());
                if let Some(amount) = check(Money::from_dollars(dollars), &label) {
                    quotes.push(PriceQuote::new(
                        PriceSource::TcgPlayer,
                        variant,
                        price_type,
                        amount,
                        observed_at,
                    ));
                }
            }
        }
        quotes
    }

    /// Cardmarket trend and average, converted from EUR. Cardmarket's
    /// standard listing is comparable to the normal printing.
    pub fn cardmarket_quotes(&self, block: &CardmarketBlock, observed_at: DateTime<Utc>) -> Vec<PriceQuote> {
        let points = [
            (PriceType::Trend, block.prices.trend_price),
            (PriceType::Average, block.prices.average_sell_price),
        ];

        points
            .into_iter()
            .filter_map(|(price_type, euros)| {
                let eur = Money::from_dollars(euros?);
                let label = format!("cardmarket-{}", price_type.as_str());
                check(eur, &label)?;
                let usd = check(eur.convert(self.eur_to_usd), &label)?;
                Some(PriceQuote::new(
                    PriceSource::Cardmarket,
                    Variant::Normal,
                    price_type,
                    usd,
                    observed_at,
                ))
            })
            .collect()
    }

    /// All quotes embedded in a catalog card.
    pub fn catalog_quotes(&self, card: &CatalogCard, observed_at: DateTime<Utc>) -> Vec<PriceQuote> {
        let mut quotes = Vec::new();
        if let Some(block) = &card.tcgplayer {
            quotes.extend(self.tcgplayer_quotes(block, observed_at));
        }
        if let Some(block) = &card.cardmarket {
            quotes.extend(self.cardmarket_quotes(block, observed_at));
        }
        debug!("Extracted {} quotes for catalog card {}", quotes.len(), card.id);
        quotes
    }

    /// PriceCharting loose, CIB, new and graded prices (already in cents).
    pub fn guide_quotes(&self, product: &GuideProduct, observed_at: DateTime<Utc>) -> Vec<PriceQuote> {
        let variant = infer_product_variant(&product.product_name);
        let points = [
            (PriceType::Loose, product.loose_price),
            (PriceType::Cib, product.cib_price),
            (PriceType::New, product.new_price),
            (PriceType::Graded, product.graded_price),
        ];

        let quotes: Vec<PriceQuote> = points
            .into_iter()
            .filter_map(|(price_type, cents)| {
                let label = format!("pricecharting-{}", price_type.as_str());
                let amount = check(Money::from_cents(cents?), &label)?;
                Some(PriceQuote::new(
                    PriceSource::PriceCharting,
                    variant,
                    price_type,
                    amount,
                    observed_at,
                ))
            })
            .collect();
        debug!("Extracted {} quotes for product {}", quotes.len(), product.id);
        quotes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CardmarketPrices, TcgPlayerPrices};
    use std::collections::BTreeMap;

    fn product(name: &str, loose: Option<i64>, graded: Option<i64>) -> GuideProduct {
        GuideProduct {
            id: "1".to_string(),
            product_name: name.to_string(),
            console_name: "Pokemon Base Set".to_string(),
            loose_price: loose,
            cib_price: None,
            new_price: None,
            graded_price: graded,
        }
    }

    #[test]
    fn test_price_validity() {
        assert!(is_valid_price(Money::from_cents(250)));
        assert!(is_valid_price(Money::from_cents(100_000)));
        assert!(!is_valid_price(Money::zero()));
        assert!(!is_valid_price(Money::from_cents(-5)));
        assert!(!is_valid_price(Money::from_cents(1)));
        assert!(!is_valid_price(Money::from_cents(99_999)));
        assert!(!is_valid_price(Money::from_cents(999_999)));
        assert!(!is_valid_price(Money::from_cents(100_001)));
    }

    #[test]
    fn test_tcgplayer_skips_high_and_invalid() {
        let mut prices = BTreeMap::new();
        prices.insert(
            "reverseHolofoil".to_string(),
            TcgPlayerPrices {
                low: Some(0.01),
                mid: Some(3.0),
                high: Some(80.0),
                market: Some(2.5),
                direct_low: None,
            },
        );
        let block = TcgPlayerBlock {
            url: None,
            updated_at: None,
            prices,
        };

        let quotes = PriceExtractor::default().tcgplayer_quotes(&block, Utc::now());
        assert_eq!(quotes.len(), 2);
        assert!(quotes.iter().all(|q| q.variant == Variant::ReverseHolofoil));
        assert!(quotes.iter().all(|q| q.source == PriceSource::TcgPlayer));
        let market = quotes.iter().find(|q| q.price_type == PriceType::Market).unwrap();
        assert_eq!(market.amount.cents(), 250);
    }

    #[test]
    fn test_cardmarket_converts_eur() {
        let block = CardmarketBlock {
            url: None,
            updated_at: None,
            prices: CardmarketPrices {
                average_sell_price: Some(4.00),
                low_price: Some(1.00),
                trend_price: Some(950.0),
            },
        };

        // 950 EUR is 1045 USD, above the cap
        let quotes = PriceExtractor::new(1.10).cardmarket_quotes(&block, Utc::now());
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].price_type, PriceType::Average);
        assert_eq!(quotes[0].amount.cents(), 440);
        assert_eq!(quotes[0].variant, Variant::Normal);
    }

    #[test]
    fn test_guide_quotes_in_cents() {
        let quotes = PriceExtractor::default()
            .guide_quotes(&product("Charizard #4", Some(35_000), Some(999_999)), Utc::now());
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].price_type, PriceType::Loose);
        assert_eq!(quotes[0].amount.cents(), 35_000);
        assert_eq!(quotes[0].source, PriceSource::PriceCharting);
    }

    #[test]
    fn test_infer_product_variant() {
        assert_eq!(infer_product_variant("Pikachu [Reverse Holo] #58"), Variant::ReverseHolofoil);
        assert_eq!(infer_product_variant("Charizard [Holo] #4"), Variant::Holofoil);
        assert_eq!(infer_product_variant("Machamp [1st Edition] #8"), Variant::FirstEdition);
        assert_eq!(infer_product_variant("Pikachu #58"), Variant::Normal);
    }
}
