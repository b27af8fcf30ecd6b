//! Card identity matching across providers.
//!
//! Providers spell the same card differently: `"Base Set"` vs
//! `"Pokemon Base Set"`, `"Charizard"` vs `"Charizard #4"`, `"004/102"` vs `"4"`.
//! Names and sets are compared after normalization; the card number and a
//! Jaro-Winkler score only rank candidates that already match.

use crate::types::CardQuery;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::OnceLock;
use strsim::jaro_winkler;

type AliasMap = HashMap<&'static str, &'static str>;

/// Normalized set spelling -> canonical normalized spelling
static SET_ALIASES: OnceLock<AliasMap> = OnceLock::new();

const SET_QUALIFIERS: &[&str] = &["pokemon", "set", "tcg", "card", "cards", "the"];
const NAME_QUALIFIERS: &[&str] = &["pokemon"];

fn init_set_aliases() -> AliasMap {
    let mut map = HashMap::new();
    // HeartGold & SoulSilver era
    map.insert("hs triumphant", "triumphant");
    map.insert("hs undaunted", "undaunted");
    map.insert("hs unleashed", "unleashed");
    map.insert("heartgold soulsilver", "heartgold soulsilver");
    map.insert("hgss", "heartgold soulsilver");
    // Scarlet & Violet
    map.insert("scarlet violet 151", "151");
    map.insert("sv 151", "151");
    map.insert("sv151", "151");
    map.insert("scarlet violet base", "scarlet violet");
    map.insert("sv base", "scarlet violet");
    // Sword & Shield
    map.insert("sword shield base", "sword shield");
    map.insert("swsh base", "sword shield");
    map.insert("crown zenith galarian gallery", "crown zenith");
    // Classic
    map.insert("base 1", "base");
    map.insert("base unlimited", "base");
    map.insert("base shadowless", "base");
    map.insert("1st edition base", "base");
    map.insert("base2", "base 2");
    map.insert("legendary collection reverse holo", "legendary collection");
    map
}

fn set_aliases() -> &'static AliasMap {
    SET_ALIASES.get_or_init(init_set_aliases)
}

/// Match confidence level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchConfidence {
    None = 0,
    /// Name and set agree after normalization
    NameAndSet = 1,
    /// Name, set and card number all agree
    Exact = 2,
}

/// Result of matching a query against one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub confidence: MatchConfidence,
    /// Jaro-Winkler similarity of the raw names, used for ranking only
    pub score: f64,
    pub reason: String,
}

impl MatchResult {
    fn none(reason: &str) -> Self {
        Self {
            confidence: MatchConfidence::None,
            score: 0.0,
            reason: reason.to_string(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.confidence >= MatchConfidence::NameAndSet
    }
}

/// A provider record that can be matched against a [`CardQuery`].
pub trait MatchCandidate {
    fn candidate_name(&self) -> &str;
    fn candidate_set(&self) -> &str;
    fn candidate_number(&self) -> Option<&str>;
}

/// Drop `[...]` and `(...)` qualifiers, e.g. `"Charizard [1st Edition]"`.
fn strip_bracketed(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Case-fold, turn punctuation into spaces, drop bracketed qualifiers and
/// collapse whitespace.
pub fn normalize(s: &str) -> String {
    strip_bracketed(s)
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' => 'e',
            c if c.is_alphanumeric() || c.is_whitespace() => c,
            _ => ' ',
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_words(normalized: &str, words: &[&str]) -> String {
    normalized
        .split_whitespace()
        .filter(|w| !words.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized card name. Suffixes like `VMAX`, `V`, `GX`, `EX` are kept.
pub fn normalize_name(name: &str) -> String {
    strip_words(&normalize(name), NAME_QUALIFIERS)
}

/// Normalized set name with qualifier words removed and aliases applied.
pub fn normalize_set(set_name: &str) -> String {
    let stripped = strip_words(&normalize(set_name), SET_QUALIFIERS);
    match set_aliases().get(stripped.as_str()) {
        Some(canonical) => canonical.to_string(),
        None => stripped,
    }
}

/// Normalized card number: the part before `/`, without `#` or leading zeros.
///
/// `"004/102"` and `"#4"` both become `"4"`.
pub fn normalize_number(number: &str) -> Option<String> {
    let head = number.split('/').next().unwrap_or_default();
    let cleaned = head.trim().trim_start_matches('#').trim().to_lowercase();
    if cleaned.is_empty() {
        return None;
    }
    let trimmed = cleaned.trim_start_matches('0');
    if trimmed.is_empty() {
        Some("0".to_string())
    } else {
        Some(trimmed.to_string())
    }
}

/// Split a product title that embeds the card number.
///
/// `"Charizard #4"` gives `("Charizard", Some("4"))`. Titles without a
/// trailing `#number` come back unchanged.
pub fn split_product_name(product_name: &str) -> (String, Option<String>) {
    if let Some(idx) = product_name.rfind('#') {
        let (name, rest) = product_name.split_at(idx);
        let number = rest.trim_start_matches('#').trim();
        if !number.is_empty() && number.chars().any(|c| c.is_ascii_digit()) {
            return (name.trim().to_string(), Some(number.to_string()));
        }
    }
    (product_name.trim().to_string(), None)
}

/// Match one candidate against the query.
pub fn match_card<C: MatchCandidate + ?Sized>(query: &CardQuery, candidate: &C) -> MatchResult {
    if normalize_name(&query.name) != normalize_name(candidate.candidate_name()) {
        return MatchResult::none("name differs");
    }
    if normalize_set(&query.set_name) != normalize_set(candidate.candidate_set()) {
        return MatchResult::none("set differs");
    }

    let score = jaro_winkler(
        &query.name.trim().to_lowercase(),
        &candidate.candidate_name().trim().to_lowercase(),
    );

    let number_agrees = match (
        query.number().and_then(normalize_number),
        candidate.candidate_number().and_then(normalize_number),
    ) {
        (Some(q), Some(c)) => q == c,
        _ => false,
    };

    if number_agrees {
        MatchResult {
            confidence: MatchConfidence::Exact,
            score,
            reason: "name, set and number match".to_string(),
        }
    } else {
        MatchResult {
            confidence: MatchConfidence::NameAndSet,
            score,
            reason: "name and set match".to_string(),
        }
    }
}

/// Pick the best matching candidate, or `None` when nothing matches.
///
/// Ranking: number agreement, then name similarity, then original order.
pub fn best_match<'a, C: MatchCandidate>(query: &CardQuery, candidates: &'a [C]) -> Option<&'a C> {
    let mut ranked: Vec<(usize, MatchResult)> = candidates
        .iter()
        .enumerate()
        .map(|(idx, c)| (idx, match_card(query, c)))
        .filter(|(_, result)| result.is_match())
        .collect();

    ranked.sort_by(|(ia, a), (ib, b)| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then_with(|| ia.cmp(ib))
    });

    ranked.first().map(|(idx, _)| &candidates[*idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Candidate {
        name: &'static str,
        set: &'static str,
        number: Option<&'static str>,
    }

    impl MatchCandidate for Candidate {
        fn candidate_name(&self) -> &str {
            self.name
        }
        fn candidate_set(&self) -> &str {
            self.set
        }
        fn candidate_number(&self) -> Option<&str> {
            self.number
        }
    }

    fn candidate(name: &'static str, set: &'static str, number: Option<&'static str>) -> Candidate {
        Candidate { name, set, number }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Mr. Mime  "), "mr mime");
        assert_eq!(normalize("Charizard [1st Edition]"), "charizard");
        assert_eq!(normalize("Scarlet & Violet"), "scarlet violet");
        assert_eq!(normalize("Pokémon"), "pokemon");
    }

    #[test]
    fn test_normalize_set_strips_qualifiers() {
        assert_eq!(normalize_set("Base Set"), "base");
        assert_eq!(normalize_set("Pokemon Base Set"), "base");
        assert_eq!(normalize_set("The Pokemon TCG Evolving Skies"), "evolving skies");
        assert_eq!(normalize_set("HS-Triumphant"), "triumphant");
        assert_eq!(normalize_set("Pokemon Scarlet & Violet 151"), "151");
        assert_eq!(normalize_set("151"), "151");
    }

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number("004/102"), Some("4".to_string()));
        assert_eq!(normalize_number("#4"), Some("4".to_string()));
        assert_eq!(normalize_number("TG05"), Some("tg05".to_string()));
        assert_eq!(normalize_number("000"), Some("0".to_string()));
        assert_eq!(normalize_number(" "), None);
    }

    #[test]
    fn test_split_product_name() {
        assert_eq!(
            split_product_name("Charizard #4"),
            ("Charizard".to_string(), Some("4".to_string()))
        );
        assert_eq!(
            split_product_name("Pikachu [Reverse Holo] #58"),
            ("Pikachu [Reverse Holo]".to_string(), Some("58".to_string()))
        );
        assert_eq!(split_product_name("Booster Box"), ("Booster Box".to_string(), None));
    }

    #[test]
    fn test_match_ignores_trailing_space_and_set_qualifier() {
        let query = CardQuery::new("Pikachu", "Base Set", None);
        assert!(match_card(&query, &candidate("Pikachu ", "Base", None)).is_match());
    }

    #[test]
    fn test_vmax_suffix_is_meaningful() {
        let query = CardQuery::new("Pikachu VMAX", "Vivid Voltage", None);
        let result = match_card(&query, &candidate("Pikachu", "Vivid Voltage", None));
        assert!(!result.is_match());
        assert_eq!(result.confidence, MatchConfidence::None);
    }

    #[test]
    fn test_set_mismatch_is_not_a_match() {
        let query = CardQuery::new("Charizard", "Base Set", None);
        assert!(!match_card(&query, &candidate("Charizard", "Base Set 2", None)).is_match());
    }

    #[test]
    fn test_number_breaks_ties() {
        let query = CardQuery::new("Pikachu", "Base Set", Some("58/102"));
        let candidates = vec![
            candidate("Pikachu", "Pokemon Base Set", Some("60")),
            candidate("Pikachu", "Pokemon Base Set", Some("58")),
        ];
        let best = best_match(&query, &candidates).unwrap();
        assert_eq!(best.number, Some("58"));
    }

    #[test]
    fn test_original_order_breaks_remaining_ties() {
        let query = CardQuery::new("Pikachu", "Base Set", None);
        let candidates = vec![
            candidate("Pikachu", "Base", Some("58")),
            candidate("Pikachu", "Base", Some("60")),
        ];
        assert_eq!(best_match(&query, &candidates).unwrap().number, Some("58"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let query = CardQuery::new("Mewtwo", "Base Set", None);
        let candidates = vec![candidate("Pikachu", "Base", None)];
        assert!(best_match(&query, &candidates).is_none());
    }
}
