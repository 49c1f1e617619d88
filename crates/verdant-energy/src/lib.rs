//! # Verdant Energy - Accumulation & Rate Analytics Engine
//!
//! Turns an append-only stream of on-chain harvest events into generation
//! rates, day-bucketed trend statistics, and a real-time projection of a
//! user's accumulated energy against their capacity ceiling.
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Rate Calculator | `rate` | `ContractRateSnapshot` |
//! | Time-Series Aggregator | `timeseries` | `RateHistory` |
//! | Real-Time Projector | `projector` | `LiveAccumulationState` |
//!
//! Historical path: log store → rate calculator → time-series aggregator.
//! Live path: log store + on-chain balance → projector.
//!
//! ## Design
//!
//! - Every public entry point returns a well-formed, zero-safe value under
//!   all input conditions. Missing data and collaborator failures degrade
//!   to documented defaults; nothing in this crate panics or propagates
//!   an error to the dashboard.
//! - All computations are pure over their inputs; I/O lives behind the
//!   [`LogStore`] and [`ChainReader`] collaborator traits.
//! - Energy amounts are micro-units: 10⁻⁶ of a display unit.

pub mod collaborators;
pub mod log;
pub mod projector;
pub mod rate;
pub mod timeseries;

// Re-exports
pub use collaborators::{ChainReader, CollaboratorError, Degraded, LogStore};
pub use log::{HarvestLog, TokenMeta};
pub use projector::{
    project_accumulation, user_harvest_stats, AccumulationProjector, CapacityStatus, DataQuality,
    LiveAccumulationState, ProjectionCache, UserHarvestStats,
};
pub use rate::{
    base_rate_per_token, contract_rate_snapshot, contract_rate_snapshot_at, ContractRateSnapshot,
};
pub use timeseries::{
    compare_rate_histories, compare_rate_histories_at, daily_rate_series, daily_rate_series_at,
    rate_history, rate_history_at, DailyRatePoint, RateHistory, TrendDirection,
};

/// Protocol constants shared by every stage of the engine
pub mod constants {
    /// Micro-units per display unit of energy (6 decimals)
    pub const MICRO_UNITS_PER_ENERGY: u64 = 1_000_000;

    /// Modeled average block interval: 10 minutes
    pub const SECONDS_PER_BLOCK: u64 = 600;

    /// Blocks per hour under the modeled interval
    pub const BLOCKS_PER_HOUR: u64 = 6;

    /// Default rate-snapshot window: 24 hours
    pub const DEFAULT_TIME_WINDOW_HOURS: u64 = 24;

    /// Default day-series lookback: 30 days
    pub const DEFAULT_DAYS_BACK: u64 = 30;

    /// Default max capacity when the chain reader cannot supply one:
    /// 100 display units in micro-units
    pub const DEFAULT_MAX_CAPACITY: u64 = 100 * MICRO_UNITS_PER_ENERGY;

    /// Capacity percentage at which the warning tier starts
    pub const CAPACITY_WARNING_PCT: f64 = 60.0;

    /// Capacity percentage at which the critical tier starts (and a
    /// harvest is considered needed)
    pub const CAPACITY_CRITICAL_PCT: f64 = 85.0;

    /// Capacity percentage at which accrual is being wasted
    pub const CAPACITY_OVERFLOW_PCT: f64 = 100.0;

    /// Trend threshold as a fraction of the overall average rate
    pub const TREND_THRESHOLD_FRACTION: f64 = 0.1;

    /// Default token decimals for the theoretical per-token rate
    pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

    /// Projection cache time-to-live in seconds
    pub const PROJECTION_CACHE_TTL_SECS: u64 = 30;
}

pub use constants::*;

/// Convert micro-units to display units
pub fn micro_to_display(micro: u64) -> f64 {
    micro as f64 / MICRO_UNITS_PER_ENERGY as f64
}
