//! JSON views returned by the HTTP API.
//!
//! Amounts leave the core as integer cents and are rendered here as dollar
//! floats rounded to the cent; margins as percentages with two decimals.

use crate::arbitrage::{ArbitrageOpportunity, ArbitrageReport};
use crate::providers::{CatalogCard, CatalogSet};
use crate::types::{PriceQuote, PriceSource, PriceType, Variant};
use crate::utils::money::round_to_cents;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePointView {
    pub source: PriceSource,
    pub variant: Variant,
    pub price_type: PriceType,
    pub price: f64,
}

impl From<&PriceQuote> for PricePointView {
    fn from(quote: &PriceQuote) -> Self {
        Self {
            source: quote.source,
            variant: quote.variant,
            price_type: quote.price_type,
            price: quote.amount.as_dollars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityView {
    pub variant: Variant,
    pub buy_source: PriceSource,
    pub buy_price_type: PriceType,
    pub buy_price: f64,
    pub sell_source: PriceSource,
    pub sell_price_type: PriceType,
    pub sell_price: f64,
    pub profit: f64,
    pub margin_pct: f64,
    pub net_profit: f64,
}

impl From<&ArbitrageOpportunity> for OpportunityView {
    fn from(opp: &ArbitrageOpportunity) -> Self {
        Self {
            variant: opp.buy_from.variant,
            buy_source: opp.buy_from.source,
            buy_price_type: opp.buy_from.price_type,
            buy_price: opp.buy_from.amount.as_dollars(),
            sell_source: opp.sell_to.source,
            sell_price_type: opp.sell_to.price_type,
            sell_price: opp.sell_to.amount.as_dollars(),
            profit: opp.profit.as_dollars(),
            margin_pct: round_to_cents(opp.margin_pct),
            net_profit: opp.net_profit.as_dollars(),
        }
    }
}

/// Body of a successful `/api/card_prices` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardPricesResponse {
    pub success: bool,
    pub card_name: String,
    pub set_name: String,
    pub card_number: Option<String>,
    pub has_arbitrage: bool,
    pub opportunities_count: usize,
    pub opportunities: Vec<OpportunityView>,
    pub price_points: Vec<PricePointView>,
    pub notes: Vec<String>,
}

impl From<&ArbitrageReport> for CardPricesResponse {
    fn from(report: &ArbitrageReport) -> Self {
        Self {
            success: true,
            card_name: report.card.name.clone(),
            set_name: report.card.set_name.clone(),
            card_number: report.card.card_number.clone(),
            has_arbitrage: report.has_arbitrage,
            opportunities_count: report.opportunities.len(),
            opportunities: report.opportunities.iter().map(OpportunityView::from).collect(),
            price_points: report.price_points.iter().map(PricePointView::from).collect(),
            notes: report.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSuggestion {
    pub id: String,
    pub name: String,
    pub set: String,
    pub number: Option<String>,
    pub image: Option<String>,
}

impl From<&CatalogCard> for CardSuggestion {
    fn from(card: &CatalogCard) -> Self {
        Self {
            id: card.id.clone(),
            name: card.name.clone(),
            set: card.set.name.clone(),
            number: card.number.clone(),
            image: card.images.as_ref().and_then(|i| i.small.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<CardSuggestion>,
}

impl SuggestionsResponse {
    pub fn from_cards(cards: &[CatalogCard]) -> Self {
        Self {
            suggestions: cards.iter().map(CardSuggestion::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetView {
    pub id: String,
    pub name: String,
    pub series: Option<String>,
    pub release_date: Option<String>,
    pub total: Option<u32>,
    pub image_url: Option<String>,
}

impl From<&CatalogSet> for SetView {
    fn from(set: &CatalogSet) -> Self {
        Self {
            id: set.id.clone(),
            name: set.name.clone(),
            series: set.series.clone(),
            release_date: set.release_date.clone(),
            total: set.total,
            image_url: set.images.as_ref().and_then(|i| i.symbol.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetsResponse {
    pub sets: Vec<SetView>,
}

impl SetsResponse {
    pub fn from_sets(sets: &[CatalogSet]) -> Self {
        Self {
            sets: sets.iter().map(SetView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::analyze;
    use crate::types::CardRecord;
    use crate::utils::money::Money;
    use chrono::Utc;

    fn quote(source: PriceSource, cents: i64) -> PriceQuote {
        PriceQuote::new(source, Variant::Normal, PriceType::Market, Money::from_cents(cents), Utc::now())
    }

    #[test]
    fn test_card_prices_response_renders_dollars() {
        let report = analyze(
            CardRecord::new("Pikachu", "Base", Some("58")),
            vec![quote(PriceSource::TcgPlayer, 1000), quote(PriceSource::Cardmarket, 300)],
            Vec::new(),
        );
        let response = CardPricesResponse::from(&report);

        assert!(response.success);
        assert!(response.has_arbitrage);
        assert_eq!(response.opportunities_count, 1);
        let opp = &response.opportunities[0];
        assert_eq!(opp.buy_price, 3.0);
        assert_eq!(opp.sell_price, 10.0);
        assert_eq!(opp.profit, 7.0);
        // 700 / 300 = 233.333...%
        assert_eq!(opp.margin_pct, 233.33);
        assert_eq!(response.price_points.len(), 2);
    }

    #[test]
    fn test_response_json_shape() {
        let report = analyze(
            CardRecord::new("Pikachu", "Base", None),
            vec![quote(PriceSource::TcgPlayer, 1000)],
            vec!["card not found on pricecharting".to_string()],
        );
        let json = serde_json::to_value(CardPricesResponse::from(&report)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["card_name"], "Pikachu");
        assert_eq!(json["has_arbitrage"], false);
        assert_eq!(json["opportunities_count"], 0);
        assert_eq!(json["price_points"][0]["source"], "tcgplayer");
        assert_eq!(json["price_points"][0]["price_type"], "market");
        assert_eq!(json["price_points"][0]["price"], 10.0);
        assert_eq!(json["notes"][0], "card not found on pricecharting");
    }

    #[test]
    fn test_error_response() {
        let json = serde_json::to_value(ErrorResponse::new("card not found")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "card not found"}));
    }
}
