//! # Harvest Log Model
//!
//! Value types supplied by the host system: on-chain harvest events and
//! token metadata. Immutable once recorded; this engine never mutates them.

use serde::{Deserialize, Serialize};

/// One on-chain harvest event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarvestLog {
    /// Account that performed the harvest
    pub sender: String,

    /// Block the event was recorded in (monotonically non-decreasing
    /// per chain, but logs may arrive unordered)
    pub block_height: u64,

    /// Block timestamp, Unix seconds (may be absent; zero means unknown)
    pub block_time: i64,

    /// Harvested amount in micro-units (10⁻⁶ display units)
    pub energy: u64,

    /// Energy-generating contract this event belongs to
    pub contract_id: String,
}

impl HarvestLog {
    /// True when the log carries a usable timestamp
    pub fn has_timestamp(&self) -> bool {
        self.block_time > 0
    }
}

/// Token metadata resolved by the host's lookup service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenMeta {
    /// Contract identifier
    pub contract_id: String,

    /// Ticker symbol
    pub symbol: String,

    /// Human-readable name
    pub name: String,

    /// Token decimals (6 for energy-class tokens)
    pub decimals: u8,
}

impl TokenMeta {
    /// Smallest on-chain unit of one whole token
    pub fn one_token_unit(&self) -> f64 {
        10f64.powi(self.decimals as i32)
    }
}
