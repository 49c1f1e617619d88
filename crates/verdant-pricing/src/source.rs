//! # Price Sources
//!
//! The host system delivers prices in one of three shapes depending on
//! which upstream feed answered: a map keyed by contract id, a list of
//! price records, or a canonical per-symbol struct. [`PriceSource`] makes
//! the three explicit, and [`PriceSource::normalize`] is the single
//! dispatch point turning any of them into [`NormalizedPrices`].
//!
//! Prices that are zero, negative, or non-finite are unknown, not cheap:
//! they are dropped during normalization and surface later as warnings.

use crate::constants::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use verdant_energy::TokenMeta;

/// One priced asset from a list-shaped feed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Contract the price belongs to
    pub contract_id: String,

    /// Ticker symbol, when the feed provides one
    pub symbol: Option<String>,

    /// USD price
    pub price_usd: f64,

    /// When the feed last refreshed this price, Unix seconds
    pub updated_at: Option<i64>,
}

/// Canonical per-symbol price struct
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPrices {
    /// USD price of one display unit of energy
    pub energy_usd: f64,

    /// USD price per token symbol
    pub token_usd: HashMap<String, f64>,

    /// The feed's own confidence in these prices, 0..=1
    pub confidence: f64,

    /// When the feed last refreshed, Unix seconds
    pub updated_at: Option<i64>,
}

/// The three price shapes the host system may deliver
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PriceSource {
    /// Contract id → USD price
    Map(HashMap<String, f64>),

    /// Flat list of price records
    List(Vec<PriceRecord>),

    /// Canonical per-symbol struct
    Canonical(CanonicalPrices),
}

/// One internal schema every source shape normalizes into
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPrices {
    /// USD price of one display unit of energy; `None` when unknown
    pub energy_price_usd: Option<f64>,

    /// USD price per token symbol (only valid prices survive)
    pub token_usd: HashMap<String, f64>,

    /// Source confidence, 0..=1
    pub confidence: f64,

    /// True when any known refresh timestamp is past the stale window
    pub stale: bool,
}

impl NormalizedPrices {
    /// Empty price set: nothing known, minimal confidence
    pub fn unknown() -> Self {
        Self {
            energy_price_usd: None,
            token_usd: HashMap::new(),
            confidence: 0.0,
            stale: false,
        }
    }

    /// Valid USD price for a symbol, if known
    pub fn price_for(&self, symbol: &str) -> Option<f64> {
        self.token_usd.get(symbol).copied()
    }
}

fn valid_price(price: f64) -> Option<f64> {
    (price.is_finite() && price > 0.0).then_some(price)
}

fn is_stale(updated_at: Option<i64>, now: i64) -> bool {
    matches!(updated_at, Some(t) if now - t > PRICE_STALE_AFTER_SECS)
}

impl PriceSource {
    /// Normalize any accepted shape into the internal schema.
    ///
    /// `energy_contract_id` identifies which entry of a contract-keyed
    /// shape carries the energy price; `meta` maps contract ids to
    /// symbols for the other entries (entries with no known symbol are
    /// dropped).
    pub fn normalize(
        &self,
        energy_contract_id: &str,
        meta: &[TokenMeta],
        now: i64,
    ) -> NormalizedPrices {
        let symbol_of = |contract_id: &str| -> Option<String> {
            meta.iter()
                .find(|m| m.contract_id == contract_id)
                .map(|m| m.symbol.clone())
        };

        match self {
            Self::Map(prices) => {
                let mut token_usd = HashMap::new();
                let mut energy_price_usd = None;
                for (contract_id, &price) in prices {
                    let Some(price) = valid_price(price) else {
                        continue;
                    };
                    if contract_id == energy_contract_id {
                        energy_price_usd = Some(price);
                    }
                    if let Some(symbol) = symbol_of(contract_id) {
                        token_usd.insert(symbol, price);
                    }
                }
                NormalizedPrices {
                    energy_price_usd,
                    token_usd,
                    confidence: MAP_SOURCE_CONFIDENCE,
                    stale: false,
                }
            }
            Self::List(records) => {
                let mut token_usd = HashMap::new();
                let mut energy_price_usd = None;
                let mut stale = false;
                for record in records {
                    stale |= is_stale(record.updated_at, now);
                    let Some(price) = valid_price(record.price_usd) else {
                        continue;
                    };
                    if record.contract_id == energy_contract_id {
                        energy_price_usd = Some(price);
                    }
                    let symbol = record
                        .symbol
                        .clone()
                        .or_else(|| symbol_of(&record.contract_id));
                    if let Some(symbol) = symbol {
                        token_usd.insert(symbol, price);
                    }
                }
                NormalizedPrices {
                    energy_price_usd,
                    token_usd,
                    confidence: LIST_SOURCE_CONFIDENCE,
                    stale,
                }
            }
            Self::Canonical(canonical) => {
                let token_usd = canonical
                    .token_usd
                    .iter()
                    .filter_map(|(symbol, &price)| {
                        valid_price(price).map(|p| (symbol.clone(), p))
                    })
                    .collect();
                NormalizedPrices {
                    energy_price_usd: valid_price(canonical.energy_usd),
                    token_usd,
                    confidence: canonical.confidence.clamp(0.0, 1.0),
                    stale: is_stale(canonical.updated_at, now),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_704_067_200;

    fn meta(contract_id: &str, symbol: &str) -> TokenMeta {
        TokenMeta {
            contract_id: contract_id.into(),
            symbol: symbol.into(),
            name: symbol.into(),
            decimals: 6,
        }
    }

    #[test]
    fn test_map_shape_normalizes_by_contract_id() {
        let mut prices = HashMap::new();
        prices.insert("verdant.energy".to_string(), 0.05);
        prices.insert("verdant.token".to_string(), 2.5);
        let source = PriceSource::Map(prices);

        let normalized = source.normalize(
            "verdant.energy",
            &[meta("verdant.energy", "NRG"), meta("verdant.token", "VERT")],
            NOW,
        );

        assert_eq!(normalized.energy_price_usd, Some(0.05));
        assert_eq!(normalized.price_for("VERT"), Some(2.5));
        assert_eq!(normalized.confidence, MAP_SOURCE_CONFIDENCE);
        assert!(!normalized.stale);
    }

    #[test]
    fn test_list_shape_uses_record_symbol_and_flags_stale() {
        let source = PriceSource::List(vec![
            PriceRecord {
                contract_id: "verdant.energy".into(),
                symbol: None,
                price_usd: 0.05,
                updated_at: Some(NOW - 30),
            },
            PriceRecord {
                contract_id: "verdant.token".into(),
                symbol: Some("VERT".into()),
                price_usd: 2.5,
                updated_at: Some(NOW - 2 * PRICE_STALE_AFTER_SECS),
            },
        ]);

        let normalized = source.normalize("verdant.energy", &[meta("verdant.energy", "NRG")], NOW);

        assert_eq!(normalized.energy_price_usd, Some(0.05));
        assert_eq!(normalized.price_for("NRG"), Some(0.05));
        assert_eq!(normalized.price_for("VERT"), Some(2.5));
        assert!(normalized.stale);
    }

    #[test]
    fn test_canonical_shape_passes_through() {
        let mut token_usd = HashMap::new();
        token_usd.insert("VERT".to_string(), 2.5);
        let source = PriceSource::Canonical(CanonicalPrices {
            energy_usd: 0.05,
            token_usd,
            confidence: 0.97,
            updated_at: Some(NOW - 10),
        });

        let normalized = source.normalize("verdant.energy", &[], NOW);

        assert_eq!(normalized.energy_price_usd, Some(0.05));
        assert_eq!(normalized.price_for("VERT"), Some(2.5));
        assert_eq!(normalized.confidence, 0.97);
        assert!(!normalized.stale);
    }

    #[test]
    fn test_invalid_prices_are_unknown() {
        let mut prices = HashMap::new();
        prices.insert("verdant.energy".to_string(), 0.0);
        prices.insert("verdant.token".to_string(), -3.0);
        let source = PriceSource::Map(prices);

        let normalized = source.normalize(
            "verdant.energy",
            &[meta("verdant.token", "VERT")],
            NOW,
        );

        assert_eq!(normalized.energy_price_usd, None);
        assert_eq!(normalized.price_for("VERT"), None);
    }

    #[test]
    fn test_unknown_set_is_empty_zero_confidence() {
        let unknown = NormalizedPrices::unknown();
        assert_eq!(unknown.energy_price_usd, None);
        assert!(unknown.token_usd.is_empty());
        assert_eq!(unknown.confidence, 0.0);
    }
}
