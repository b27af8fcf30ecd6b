//! Cross-market arbitrage detection.
//!
//! Every ordered (buy, sell) pair of raw-card quotes from different markets
//! for the same printing is a candidate; candidates with a positive margin
//! become opportunities. Graded, CIB, new and `low` quotes are reported as
//! price points but never paired.

use crate::types::{CardRecord, PriceQuote};
use crate::utils::money::{margin_percentage, Money};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Flat shipping cost used for the informational net profit
pub const SHIPPING_COST: Money = Money::from_cents(100);

/// Margins above this percentage are treated as data errors
pub const MAX_MARGIN_PCT: i64 = 500;

const SUSPICIOUS_BUY_BELOW: Money = Money::from_cents(25);
const SUSPICIOUS_SELL_ABOVE: Money = Money::from_cents(50_000);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub buy_from: PriceQuote,
    pub sell_to: PriceQuote,
    /// `sell - buy`
    pub profit: Money,
    /// Profit as a percentage of the buy price
    pub margin_pct: f64,
    /// Profit after the sell market's fee and shipping. Informational only.
    pub net_profit: Money,
}

impl ArbitrageOpportunity {
    fn new(buy_from: &PriceQuote, sell_to: &PriceQuote) -> Self {
        let profit = sell_to.amount - buy_from.amount;
        let net_profit = sell_to.amount.less_fee(sell_to.source.seller_fee_rate())
            - buy_from.amount
            - SHIPPING_COST;
        Self {
            buy_from: buy_from.clone(),
            sell_to: sell_to.clone(),
            profit,
            margin_pct: margin_percentage(profit, buy_from.amount),
            net_profit,
        }
    }

    /// Exact margin comparison: `p1/b1` vs `p2/b2` as `p1*b2` vs `p2*b1`.
    fn cmp_margin(&self, other: &Self) -> Ordering {
        let lhs = self.profit.cents() as i128 * other.buy_from.amount.cents() as i128;
        let rhs = other.profit.cents() as i128 * self.buy_from.amount.cents() as i128;
        lhs.cmp(&rhs)
    }
}

/// Result of analyzing one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageReport {
    pub card: CardRecord,
    pub has_arbitrage: bool,
    /// Sorted by margin, best first
    pub opportunities: Vec<ArbitrageOpportunity>,
    /// Every quote that took part in the analysis
    pub price_points: Vec<PriceQuote>,
    /// Degradations worth telling the user about
    pub notes: Vec<String>,
}

impl ArbitrageReport {
    /// Report with prices but no pairing, used when a provider failed.
    pub fn without_pairing(card: CardRecord, price_points: Vec<PriceQuote>, notes: Vec<String>) -> Self {
        Self {
            card,
            has_arbitrage: false,
            opportunities: Vec::new(),
            price_points,
            notes,
        }
    }
}

fn is_sane_pair(buy: &PriceQuote, sell: &PriceQuote, profit: Money) -> bool {
    if profit.cents() as i128 * 100 > MAX_MARGIN_PCT as i128 * buy.amount.cents() as i128 {
        warn!(
            "Skipping unrealistic margin: buy {} on {} -> sell {} on {}",
            buy.amount, buy.source, sell.amount, sell.source
        );
        return false;
    }
    if buy.amount < SUSPICIOUS_BUY_BELOW && sell.amount > SUSPICIOUS_SELL_ABOVE {
        warn!(
            "Skipping suspicious price pair: buy {} on {} -> sell {} on {}",
            buy.amount, buy.source, sell.amount, sell.source
        );
        return false;
    }
    true
}

/// Every profitable cross-market pair, best margin first.
///
/// Ties are broken by absolute profit, then buy source name, then sell
/// source name. Fewer than two quotes yields nothing.
pub fn find_opportunities(quotes: &[PriceQuote]) -> Vec<ArbitrageOpportunity> {
    let mut opportunities = Vec::new();
    if quotes.len() < 2 {
        return opportunities;
    }

    let pairable: Vec<&PriceQuote> = quotes.iter().filter(|q| q.price_type.is_pairable()).collect();

    for &buy in &pairable {
        if !buy.amount.is_positive() {
            continue;
        }
        for &sell in &pairable {
            if buy.source == sell.source || !buy.variant.comparable_with(&sell.variant) {
                continue;
            }
            let profit = sell.amount - buy.amount;
            if !profit.is_positive() || !is_sane_pair(buy, sell, profit) {
                continue;
            }
            opportunities.push(ArbitrageOpportunity::new(buy, sell));
        }
    }

    opportunities.sort_by(|a, b| {
        b.cmp_margin(a)
            .then_with(|| b.profit.cmp(&a.profit))
            .then_with(|| a.buy_from.source.as_str().cmp(b.buy_from.source.as_str()))
            .then_with(|| a.sell_to.source.as_str().cmp(b.sell_to.source.as_str()))
    });

    debug!(
        "{} quotes ({} pairable) produced {} opportunities",
        quotes.len(),
        pairable.len(),
        opportunities.len()
    );
    opportunities
}

/// Run the engine for one card.
pub fn analyze(card: CardRecord, quotes: Vec<PriceQuote>, notes: Vec<String>) -> ArbitrageReport {
    let opportunities = find_opportunities(&quotes);
    ArbitrageReport {
        card,
        has_arbitrage: !opportunities.is_empty(),
        opportunities,
        price_points: quotes,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PriceSource, PriceType, Variant};
    use chrono::Utc;

    fn quote(source: PriceSource, cents: i64) -> PriceQuote {
        quote_with(source, Variant::Normal, PriceType::Market, cents)
    }

    fn quote_with(source: PriceSource, variant: Variant, price_type: PriceType, cents: i64) -> PriceQuote {
        PriceQuote::new(source, variant, price_type, Money::from_cents(cents), Utc::now())
    }

    fn card() -> CardRecord {
        CardRecord::new("Pikachu", "Base Set", Some("58"))
    }

    #[test]
    fn test_ten_and_eight_gives_one_opportunity() {
        let quotes = vec![
            quote(PriceSource::TcgPlayer, 1000),
            quote(PriceSource::PriceCharting, 800),
        ];
        let opps = find_opportunities(&quotes);

        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].buy_from.source, PriceSource::PriceCharting);
        assert_eq!(opps[0].sell_to.source, PriceSource::TcgPlayer);
        assert_eq!(opps[0].profit.cents(), 200);
        assert!((opps[0].margin_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_any_two_priced_quotes_from_different_markets() {
        for (a, b) in [(100, 150), (999, 1000), (2_500, 10_000), (40_000, 100_000)] {
            let quotes = vec![
                quote(PriceSource::Cardmarket, a),
                quote(PriceSource::TcgPlayer, b),
            ];
            let opps = find_opportunities(&quotes);
            assert_eq!(opps.len(), 1, "pair {} -> {}", a, b);
            assert_eq!(opps[0].profit.cents(), b - a);
            assert_eq!(opps[0].margin_pct, margin_percentage(Money::from_cents(b - a), Money::from_cents(a)));
        }
    }

    #[test]
    fn test_single_quote_has_no_arbitrage() {
        let report = analyze(card(), vec![quote(PriceSource::TcgPlayer, 1000)], Vec::new());
        assert!(!report.has_arbitrage);
        assert!(report.opportunities.is_empty());
        assert_eq!(report.price_points.len(), 1);
    }

    #[test]
    fn test_no_quotes_has_no_arbitrage() {
        let report = analyze(card(), Vec::new(), Vec::new());
        assert!(!report.has_arbitrage);
    }

    #[test]
    fn test_equal_prices_and_same_market_are_skipped() {
        let equal = vec![
            quote(PriceSource::TcgPlayer, 500),
            quote(PriceSource::Cardmarket, 500),
        ];
        assert!(find_opportunities(&equal).is_empty());

        let same_market = vec![
            quote_with(PriceSource::TcgPlayer, Variant::Normal, PriceType::DirectLow, 300),
            quote_with(PriceSource::TcgPlayer, Variant::Normal, PriceType::Market, 500),
        ];
        assert!(find_opportunities(&same_market).is_empty());
    }

    #[test]
    fn test_different_printings_are_not_compared() {
        let quotes = vec![
            quote_with(PriceSource::TcgPlayer, Variant::Holofoil, PriceType::Market, 5000),
            quote_with(PriceSource::PriceCharting, Variant::Normal, PriceType::Loose, 1000),
        ];
        assert!(find_opportunities(&quotes).is_empty());
    }

    #[test]
    fn test_unrealistic_margins_are_skipped() {
        // 600% margin
        let quotes = vec![
            quote(PriceSource::PriceCharting, 100),
            quote(PriceSource::TcgPlayer, 700),
        ];
        assert!(find_opportunities(&quotes).is_empty());

        // exactly 500% is kept
        let quotes = vec![
            quote(PriceSource::PriceCharting, 100),
            quote(PriceSource::TcgPlayer, 600),
        ];
        assert_eq!(find_opportunities(&quotes).len(), 1);

        let suspicious = vec![
            quote(PriceSource::Cardmarket, 20),
            quote(PriceSource::TcgPlayer, 60_000),
        ];
        assert!(find_opportunities(&suspicious).is_empty());
    }

    #[test]
    fn test_sorted_by_margin_then_profit_then_source() {
        let quotes = vec![
            quote_with(PriceSource::PriceCharting, Variant::Normal, PriceType::Loose, 1000),
            quote_with(PriceSource::Cardmarket, Variant::Normal, PriceType::Trend, 1200),
            quote_with(PriceSource::TcgPlayer, Variant::Normal, PriceType::Market, 1200),
            quote_with(PriceSource::TcgPlayer, Variant::Normal, PriceType::DirectLow, 500),
            quote_with(PriceSource::Cardmarket, Variant::Normal, PriceType::Average, 600),
        ];
        let opps = find_opportunities(&quotes);

        for pair in opps.windows(2) {
            assert_ne!(pair[0].cmp_margin(&pair[1]), Ordering::Less);
        }

        // 500 -> 1200 (140%) is the best margin
        assert_eq!(opps[0].buy_from.amount.cents(), 500);
        assert_eq!(opps[0].sell_to.amount.cents(), 1200);
        assert_eq!(opps[0].sell_to.source, PriceSource::Cardmarket);

        // 1000 -> 1200 appears twice with equal margin and profit; cardmarket sorts first
        let ties: Vec<_> = opps
            .iter()
            .filter(|o| o.buy_from.amount.cents() == 1000)
            .collect();
        assert_eq!(ties.len(), 2);
        assert_eq!(ties[0].sell_to.source, PriceSource::Cardmarket);
        assert_eq!(ties[1].sell_to.source, PriceSource::TcgPlayer);
    }

    #[test]
    fn test_profit_breaks_margin_ties() {
        let quotes = vec![
            quote_with(PriceSource::PriceCharting, Variant::Normal, PriceType::Loose, 1000),
            quote_with(PriceSource::TcgPlayer, Variant::Normal, PriceType::Market, 2000),
            quote_with(PriceSource::Cardmarket, Variant::Normal, PriceType::Trend, 300),
            quote_with(PriceSource::PriceCharting, Variant::Normal, PriceType::Loose, 600),
        ];
        let opps = find_opportunities(&quotes);
        // 1000 -> 2000 and 300 -> 600 are both 100%; larger profit first
        let hundred: Vec<_> = opps.iter().filter(|o| (o.margin_pct - 100.0).abs() < 1e-9).collect();
        assert_eq!(hundred.len(), 2);
        assert_eq!(hundred[0].profit.cents(), 1000);
        assert_eq!(hundred[1].profit.cents(), 300);
    }

    #[test]
    fn test_condition_prices_never_pair_with_raw_prices() {
        let quotes = vec![
            quote_with(PriceSource::TcgPlayer, Variant::Normal, PriceType::Market, 2000),
            quote_with(PriceSource::PriceCharting, Variant::Normal, PriceType::Loose, 2100),
            quote_with(PriceSource::PriceCharting, Variant::Normal, PriceType::Cib, 4000),
            quote_with(PriceSource::PriceCharting, Variant::Normal, PriceType::New, 6000),
            quote_with(PriceSource::PriceCharting, Variant::Normal, PriceType::Graded, 9000),
        ];
        let report = analyze(card(), quotes, Vec::new());

        assert_eq!(report.opportunities.len(), 1);
        assert_eq!(report.opportunities[0].buy_from.price_type, PriceType::Market);
        assert_eq!(report.opportunities[0].sell_to.price_type, PriceType::Loose);
        assert_eq!(report.opportunities[0].profit.cents(), 100);
        // Every quote is still reported
        assert_eq!(report.price_points.len(), 5);
    }

    #[test]
    fn test_low_listing_is_not_a_buy_price() {
        let quotes = vec![
            quote_with(PriceSource::TcgPlayer, Variant::Normal, PriceType::Low, 300),
            quote_with(PriceSource::Cardmarket, Variant::Normal, PriceType::Trend, 900),
        ];
        assert!(find_opportunities(&quotes).is_empty());
    }

    #[test]
    fn test_net_profit_includes_fee_and_shipping() {
        let quotes = vec![
            quote(PriceSource::TcgPlayer, 1000),
            quote(PriceSource::PriceCharting, 800),
        ];
        let opps = find_opportunities(&quotes);
        // 10.00 less 15% = 8.50, minus 8.00 buy, minus 1.00 shipping
        assert_eq!(opps[0].net_profit.cents(), -50);
    }
}
