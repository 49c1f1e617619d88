//! # Verdant Pricing - Profitability Engine
//!
//! Consumes a live accumulation projection from `verdant-energy` plus
//! external price data and produces a USD-denominated profitability
//! estimate: daily/annual energy value and an APY over the user's token
//! holdings.
//!
//! ## Modules
//!
//! | Module | Output |
//! |--------|--------|
//! | `source` | `NormalizedPrices` from any accepted price shape |
//! | `apy` | `ProfitabilityEstimate` |
//!
//! Price sources arrive in one of three shapes (keyed map, record list,
//! canonical struct); [`PriceSource`] makes the shapes an explicit sum
//! type, normalized by a single dispatch before any math runs.
//!
//! Nothing in this crate errors: unknown or invalid prices degrade the
//! estimate's confidence and add to its warnings list, and the output is
//! always a well-formed zero-safe struct.

pub mod apy;
pub mod source;

// Re-exports
pub use apy::{
    estimate_apy, estimate_apy_from_source, BonusMultipliers, ProfitBreakdown,
    ProfitabilityEstimate, TokenHolding,
};
pub use source::{CanonicalPrices, NormalizedPrices, PriceRecord, PriceSource};

/// Pricing constants
pub mod constants {
    /// Days used to annualize the daily energy value
    pub const DAYS_PER_YEAR: f64 = 365.0;

    /// Price data older than this is considered stale
    pub const PRICE_STALE_AFTER_SECS: i64 = 900;

    /// Confidence multiplier applied when prices are stale
    pub const STALE_CONFIDENCE_FACTOR: f64 = 0.8;

    /// Default confidence of a keyed price map (no provenance metadata)
    pub const MAP_SOURCE_CONFIDENCE: f64 = 0.9;

    /// Default confidence of a price-record list
    pub const LIST_SOURCE_CONFIDENCE: f64 = 0.85;

    /// Capacity percentage that triggers the harvest-soon warning
    pub const HARVEST_SOON_PCT: f64 = 95.0;
}

pub use constants::*;
