//! # Time-Series Aggregator
//!
//! Buckets harvest logs by UTC calendar day, computes per-day rate and
//! user statistics, and derives trend direction and volatility over the
//! bucketed series.
//!
//! ## Statistics
//!
//! | Measure | Definition |
//! |---------|------------|
//! | Trend | Midpoint-split half means, threshold 10% of overall mean |
//! | Volatility | Population coefficient of variation, percent |
//! | Day anchor | Median block height observed that day |

use crate::constants::*;
use crate::log::{HarvestLog, TokenMeta};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One day-bucket of the rate series
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyRatePoint {
    /// Median block height observed that day (x-axis anchor; median
    /// rather than mean so one late-night outlier block cannot skew it)
    pub block_height: u64,

    /// Timestamp of the anchor block's first log, Unix seconds
    pub timestamp: i64,

    /// Calendar day key, `YYYY-MM-DD` (UTC)
    pub date: String,

    /// Day total divided by blocks observed that day, micro-units
    pub energy_per_block: f64,

    /// Day total divided by active users (0 when no users)
    pub energy_per_user: f64,

    /// Distinct harvesters across the whole day
    pub active_users: usize,

    /// Total energy across all blocks that day, micro-units
    pub total_energy_in_block: u64,
}

/// Direction of the rate trend over a bucketed series
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Bucketed rate series with trend and volatility statistics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateHistory {
    /// Contract the series describes
    pub contract_id: String,

    /// Ticker symbol when token metadata was supplied
    pub symbol: Option<String>,

    /// Day buckets, ascending by timestamp
    pub rate_history: Vec<DailyRatePoint>,

    /// Mean of per-bucket `energy_per_block` rates
    pub average_rate: f64,

    /// Trend over the bucketed series
    pub trend_direction: TrendDirection,

    /// Population coefficient of variation of the rates, percent.
    /// 0 iff every bucket's rate is identical or there is ≤1 bucket.
    pub volatility: f64,
}

impl RateHistory {
    /// Degenerate history for a contract with no bucketed data
    pub fn empty(contract_id: &str, symbol: Option<String>) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            symbol,
            rate_history: Vec::new(),
            average_rate: 0.0,
            trend_direction: TrendDirection::Stable,
            volatility: 0.0,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Midpoint-split trend classification. Fewer than 2 buckets is `Stable`.
fn classify_trend(rates: &[f64]) -> TrendDirection {
    if rates.len() < 2 {
        return TrendDirection::Stable;
    }
    let overall = mean(rates);
    let mid = rates.len() / 2;
    let first_half = mean(&rates[..mid]);
    let second_half = mean(&rates[mid..]);
    let threshold = TREND_THRESHOLD_FRACTION * overall;

    if second_half > first_half + threshold {
        TrendDirection::Up
    } else if second_half < first_half - threshold {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    }
}

/// Coefficient of variation as a percentage; 0 when the mean is 0.
fn volatility_pct(rates: &[f64]) -> f64 {
    let m = mean(rates);
    if m == 0.0 {
        return 0.0;
    }
    population_std_dev(rates) / m * 100.0
}

fn utc_day_key(unix_secs: i64) -> Option<String> {
    DateTime::from_timestamp(unix_secs, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Bucket a contract's logs into per-day rate points over the trailing
/// `days_back` window ending at `now`. Logs without a usable timestamp
/// cannot be assigned to a calendar day and are skipped. Returns an
/// ascending series; empty input yields an empty series, never an error.
pub fn daily_rate_series_at(
    logs: &[HarvestLog],
    contract_id: &str,
    days_back: u64,
    now: i64,
) -> Vec<DailyRatePoint> {
    let cutoff = now - (days_back as i64) * 86_400;

    let mut window: Vec<&HarvestLog> = logs
        .iter()
        .filter(|l| l.contract_id == contract_id && l.has_timestamp() && l.block_time >= cutoff)
        .collect();
    window.sort_by_key(|l| l.block_height);

    // day key → logs of that day, block-height ascending
    let mut days: BTreeMap<String, Vec<&HarvestLog>> = BTreeMap::new();
    for log in window {
        if let Some(key) = utc_day_key(log.block_time) {
            days.entry(key).or_default().push(log);
        }
    }

    let mut series: Vec<DailyRatePoint> = days
        .into_iter()
        .map(|(date, day_logs)| {
            let mut blocks: BTreeMap<u64, u64> = BTreeMap::new();
            let mut users: HashSet<&str> = HashSet::new();
            for log in &day_logs {
                *blocks.entry(log.block_height).or_default() += log.energy;
                users.insert(log.sender.as_str());
            }

            let total_energy: u64 = blocks.values().sum();
            let block_count = blocks.len();

            // Upper median of the day's block heights.
            let heights: Vec<u64> = blocks.keys().copied().collect();
            let median_height = heights[heights.len() / 2];
            let anchor_time = day_logs
                .iter()
                .find(|l| l.block_height == median_height)
                .map(|l| l.block_time)
                .unwrap_or(0);

            let energy_per_user = if users.is_empty() {
                0.0
            } else {
                total_energy as f64 / users.len() as f64
            };

            DailyRatePoint {
                block_height: median_height,
                timestamp: anchor_time,
                date,
                energy_per_block: total_energy as f64 / block_count as f64,
                energy_per_user,
                active_users: users.len(),
                total_energy_in_block: total_energy,
            }
        })
        .collect();

    series.sort_by_key(|p| p.timestamp);
    series
}

/// Convenience wrapper using the current wall clock
pub fn daily_rate_series(
    logs: &[HarvestLog],
    contract_id: &str,
    days_back: u64,
) -> Vec<DailyRatePoint> {
    daily_rate_series_at(logs, contract_id, days_back, chrono::Utc::now().timestamp())
}

/// Build the full rate history for one contract: day series plus trend
/// and volatility statistics. Degenerate input (no buckets) yields a
/// `Stable`, zero-average, empty history.
pub fn rate_history_at(
    contract_id: &str,
    logs: &[HarvestLog],
    token_meta: Option<&TokenMeta>,
    days_back: u64,
    now: i64,
) -> RateHistory {
    let symbol = token_meta.map(|m| m.symbol.clone());
    let series = daily_rate_series_at(logs, contract_id, days_back, now);
    if series.is_empty() {
        return RateHistory::empty(contract_id, symbol);
    }

    let rates: Vec<f64> = series.iter().map(|p| p.energy_per_block).collect();

    RateHistory {
        contract_id: contract_id.to_string(),
        symbol,
        average_rate: mean(&rates),
        trend_direction: classify_trend(&rates),
        volatility: volatility_pct(&rates),
        rate_history: series,
    }
}

/// Convenience wrapper using the current wall clock and default lookback
pub fn rate_history(
    contract_id: &str,
    logs: &[HarvestLog],
    token_meta: Option<&TokenMeta>,
) -> RateHistory {
    rate_history_at(
        contract_id,
        logs,
        token_meta,
        DEFAULT_DAYS_BACK,
        chrono::Utc::now().timestamp(),
    )
}

/// Compute rate histories for several contracts and rank them by average
/// rate, descending. Contracts with no bucketed data are dropped rather
/// than zero-filled.
pub fn compare_rate_histories_at(
    per_contract: &[(String, Vec<HarvestLog>)],
    meta_list: &[TokenMeta],
    days_back: u64,
    now: i64,
) -> Vec<RateHistory> {
    let mut histories: Vec<RateHistory> = per_contract
        .iter()
        .map(|(contract_id, logs)| {
            let meta = meta_list.iter().find(|m| &m.contract_id == contract_id);
            rate_history_at(contract_id, logs, meta, days_back, now)
        })
        .filter(|h| !h.rate_history.is_empty())
        .collect();

    histories.sort_by(|a, b| b.average_rate.total_cmp(&a.average_rate));
    histories
}

/// Convenience wrapper using the current wall clock and default lookback
pub fn compare_rate_histories(
    per_contract: &[(String, Vec<HarvestLog>)],
    meta_list: &[TokenMeta],
) -> Vec<RateHistory> {
    compare_rate_histories_at(
        per_contract,
        meta_list,
        DEFAULT_DAYS_BACK,
        chrono::Utc::now().timestamp(),
    )
}
