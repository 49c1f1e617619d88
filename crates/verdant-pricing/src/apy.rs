//! # Profitability (APY) Engine
//!
//! Pure function of a live accumulation projection, normalized prices,
//! and optional holdings/bonuses. APY is the theoretical annualized
//! return of the projected generation rate over the holdings' USD value;
//! current capacity pressure never alters the number, it only adds an
//! informational warning.

use crate::constants::*;
use crate::source::{NormalizedPrices, PriceSource};
use serde::{Deserialize, Serialize};
use tracing::debug;
use verdant_energy::constants::MICRO_UNITS_PER_ENERGY;
use verdant_energy::{LiveAccumulationState, TokenMeta};

/// A token position held by the user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenHolding {
    /// Ticker symbol (matched against the normalized price set)
    pub symbol: String,

    /// Amount held, display units
    pub amount: f64,
}

/// Protocol bonuses applied to the user. Only the generation multiplier
/// affects profitability output today; capacity bonus and fee reduction
/// act elsewhere in the protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BonusMultipliers {
    /// Additional generation as a fraction (0.2 = +20%)
    pub generation_multiplier: f64,

    /// Capacity ceiling bonus fraction
    pub capacity_bonus: f64,

    /// Harvest fee reduction fraction
    pub fee_reduction: f64,
}

/// Rate/price/bonus components behind an estimate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfitBreakdown {
    /// Daily generation after bonuses, display units
    pub daily_energy_units: f64,

    /// Energy price used, USD per display unit (0 when unknown)
    pub energy_price_usd: f64,

    /// Generation multiplier applied
    pub generation_multiplier: f64,

    /// Holdings value the APY is computed over, USD
    pub holdings_value_usd: f64,
}

/// USD-denominated profitability estimate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfitabilityEstimate {
    /// Annualized return over holdings value, percent; 0 when no
    /// holdings value is known
    pub apy: f64,

    /// Daily profit, USD (no operating costs are modeled)
    pub daily_profit: f64,

    /// USD value of one day of generation
    pub daily_energy_value: f64,

    /// USD value of one year of generation
    pub annual_energy_value: f64,

    /// USD value of the priced holdings
    pub token_investment_value: f64,

    /// Composite confidence, 0..=1
    pub confidence: f64,

    /// Component breakdown
    pub breakdown: ProfitBreakdown,

    /// Degradation and advisory notes; the sole channel for conveying
    /// reduced confidence to callers
    pub warnings: Vec<String>,
}

/// Estimate profitability from a projection and normalized prices.
///
/// Never errors: unknown prices contribute 0 and a warning, confidence
/// reflects price source, data quality, and staleness.
pub fn estimate_apy(
    projection: &LiveAccumulationState,
    prices: &NormalizedPrices,
    holdings: &[TokenHolding],
    bonuses: Option<&BonusMultipliers>,
) -> ProfitabilityEstimate {
    let mut warnings = Vec::new();

    let generation_multiplier = bonuses.map(|b| b.generation_multiplier).unwrap_or(0.0);
    let daily_micro_units =
        projection.energy_rate_per_second * 86_400.0 * (1.0 + generation_multiplier);
    let daily_energy_units = daily_micro_units / MICRO_UNITS_PER_ENERGY as f64;

    let energy_price_usd = match prices.energy_price_usd {
        Some(price) => price,
        None => {
            warnings.push("Energy price unavailable".to_string());
            0.0
        }
    };
    let daily_energy_value = daily_energy_units * energy_price_usd;
    let annual_energy_value = daily_energy_value * DAYS_PER_YEAR;

    let mut token_investment_value = 0.0;
    for holding in holdings {
        match prices.price_for(&holding.symbol) {
            Some(price) => token_investment_value += holding.amount * price,
            None => warnings.push(format!("Price unavailable for {}", holding.symbol)),
        }
    }

    let apy = if token_investment_value > 0.0 {
        annual_energy_value / token_investment_value * 100.0
    } else {
        warnings.push("APY requires holdings with a known USD value".to_string());
        0.0
    };

    let mut confidence = prices.confidence * projection.data_quality.confidence_factor();
    if prices.stale {
        confidence *= STALE_CONFIDENCE_FACTOR;
        warnings.push("Price data is stale".to_string());
    }
    let confidence = confidence.clamp(0.0, 1.0);

    // Advisory only; the APY number stays capacity-independent.
    if projection.capacity_percentage >= HARVEST_SOON_PCT {
        warnings.push(format!(
            "Capacity at {:.1}% - harvest soon to avoid waste",
            projection.capacity_percentage
        ));
    }

    debug!(
        user = %projection.user,
        apy,
        daily_energy_value,
        confidence,
        "profitability estimated"
    );

    ProfitabilityEstimate {
        apy,
        daily_profit: daily_energy_value,
        daily_energy_value,
        annual_energy_value,
        token_investment_value,
        confidence,
        breakdown: ProfitBreakdown {
            daily_energy_units,
            energy_price_usd,
            generation_multiplier,
            holdings_value_usd: token_investment_value,
        },
        warnings,
    }
}

/// Normalize a raw price source, then estimate.
pub fn estimate_apy_from_source(
    projection: &LiveAccumulationState,
    source: &PriceSource,
    meta: &[TokenMeta],
    holdings: &[TokenHolding],
    bonuses: Option<&BonusMultipliers>,
) -> ProfitabilityEstimate {
    let prices = source.normalize(
        &projection.contract_id,
        meta,
        chrono::Utc::now().timestamp(),
    );
    estimate_apy(projection, &prices, holdings, bonuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use verdant_energy::{CapacityStatus, DataQuality};

    /// Projection generating 1 display unit of energy per day.
    fn projection(rate_micro_per_sec: f64) -> LiveAccumulationState {
        LiveAccumulationState {
            energy_rate_per_second: rate_micro_per_sec,
            data_quality: DataQuality::Excellent,
            ..LiveAccumulationState::insufficient("u1", "verdant.energy")
        }
    }

    fn prices(energy_usd: f64, vert_usd: f64) -> NormalizedPrices {
        let mut token_usd = HashMap::new();
        token_usd.insert("VERT".to_string(), vert_usd);
        NormalizedPrices {
            energy_price_usd: Some(energy_usd),
            token_usd,
            confidence: 1.0,
            stale: false,
        }
    }

    // 1_000_000 micro-units per day.
    const ONE_UNIT_PER_DAY: f64 = 1_000_000.0 / 86_400.0;

    #[test]
    fn test_apy_over_holdings() {
        let estimate = estimate_apy(
            &projection(ONE_UNIT_PER_DAY),
            &prices(0.10, 2.0),
            &[TokenHolding {
                symbol: "VERT".into(),
                amount: 100.0,
            }],
            None,
        );

        // 0.10 USD/day => 36.5 USD/year over 200 USD holdings.
        assert!((estimate.daily_energy_value - 0.10).abs() < 1e-9);
        assert!((estimate.annual_energy_value - 36.5).abs() < 1e-6);
        assert_eq!(estimate.token_investment_value, 200.0);
        assert!((estimate.apy - 18.25).abs() < 1e-6);
        assert_eq!(estimate.daily_profit, estimate.daily_energy_value);
        assert_eq!(estimate.confidence, 1.0);
        assert!(estimate.warnings.is_empty());
    }

    #[test]
    fn test_zero_holdings_zero_apy_with_warning() {
        // P5: no holdings value => apy 0 regardless of energy value.
        let estimate = estimate_apy(
            &projection(1_000_000.0),
            &prices(100.0, 2.0),
            &[],
            None,
        );

        assert_eq!(estimate.apy, 0.0);
        assert!(estimate.annual_energy_value > 0.0);
        assert!(estimate
            .warnings
            .iter()
            .any(|w| w.contains("APY requires holdings")));
    }

    #[test]
    fn test_unpriced_holding_skipped_with_warning() {
        // Scenario D: the only holding has no price.
        let estimate = estimate_apy(
            &projection(ONE_UNIT_PER_DAY),
            &prices(0.10, 2.0),
            &[TokenHolding {
                symbol: "GHOST".into(),
                amount: 50.0,
            }],
            None,
        );

        assert_eq!(estimate.token_investment_value, 0.0);
        assert_eq!(estimate.apy, 0.0);
        assert!(estimate
            .warnings
            .contains(&"Price unavailable for GHOST".to_string()));
    }

    #[test]
    fn test_generation_multiplier_scales_daily_value() {
        let base = estimate_apy(&projection(ONE_UNIT_PER_DAY), &prices(0.10, 2.0), &[], None);
        let boosted = estimate_apy(
            &projection(ONE_UNIT_PER_DAY),
            &prices(0.10, 2.0),
            &[],
            Some(&BonusMultipliers {
                generation_multiplier: 0.5,
                capacity_bonus: 0.25,
                fee_reduction: 0.1,
            }),
        );

        assert!((boosted.daily_energy_value - base.daily_energy_value * 1.5).abs() < 1e-9);
        assert_eq!(boosted.breakdown.generation_multiplier, 0.5);
    }

    #[test]
    fn test_confidence_composition() {
        let mut limited = projection(ONE_UNIT_PER_DAY);
        limited.data_quality = DataQuality::Limited;

        let mut stale_prices = prices(0.10, 2.0);
        stale_prices.confidence = 0.9;
        stale_prices.stale = true;

        let estimate = estimate_apy(&limited, &stale_prices, &[], None);

        // 0.9 source * 0.7 limited * 0.8 stale
        assert!((estimate.confidence - 0.9 * 0.7 * 0.8).abs() < 1e-9);
        assert!(estimate
            .warnings
            .contains(&"Price data is stale".to_string()));
    }

    #[test]
    fn test_near_capacity_warns_but_does_not_move_apy() {
        let holdings = [TokenHolding {
            symbol: "VERT".into(),
            amount: 100.0,
        }];
        let calm = estimate_apy(&projection(ONE_UNIT_PER_DAY), &prices(0.10, 2.0), &holdings, None);

        let mut pressed = projection(ONE_UNIT_PER_DAY);
        pressed.capacity_percentage = 97.0;
        pressed.capacity_status = CapacityStatus::Critical;
        let warned = estimate_apy(&pressed, &prices(0.10, 2.0), &holdings, None);

        assert_eq!(warned.apy, calm.apy);
        assert!(warned
            .warnings
            .iter()
            .any(|w| w.contains("harvest soon")));
        assert!(!calm.warnings.iter().any(|w| w.contains("harvest soon")));
    }

    #[test]
    fn test_unknown_energy_price_is_zero_safe() {
        let estimate = estimate_apy(
            &projection(ONE_UNIT_PER_DAY),
            &NormalizedPrices::unknown(),
            &[],
            None,
        );

        assert_eq!(estimate.daily_energy_value, 0.0);
        assert_eq!(estimate.annual_energy_value, 0.0);
        assert_eq!(estimate.apy, 0.0);
        assert_eq!(estimate.confidence, 0.0);
        assert!(estimate
            .warnings
            .contains(&"Energy price unavailable".to_string()));
    }

    #[test]
    fn test_estimate_from_map_source() {
        let mut map = HashMap::new();
        map.insert("verdant.energy".to_string(), 0.10);
        map.insert("verdant.token".to_string(), 2.0);
        let source = PriceSource::Map(map);
        let meta = [TokenMeta {
            contract_id: "verdant.token".into(),
            symbol: "VERT".into(),
            name: "Verdant".into(),
            decimals: 6,
        }];

        let estimate = estimate_apy_from_source(
            &projection(ONE_UNIT_PER_DAY),
            &source,
            &meta,
            &[TokenHolding {
                symbol: "VERT".into(),
                amount: 100.0,
            }],
            None,
        );

        assert!((estimate.apy - 18.25).abs() < 1e-6);
    }

    #[test]
    fn test_estimate_serializes() {
        let estimate = estimate_apy(
            &projection(ONE_UNIT_PER_DAY),
            &prices(0.10, 2.0),
            &[],
            None,
        );
        let json = serde_json::to_value(&estimate).unwrap();

        assert!(json["breakdown"]["daily_energy_units"].is_number());
        assert_eq!(json["apy"], 0.0);
    }
}
