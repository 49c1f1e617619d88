//! # Real-Time Accumulation Projector
//!
//! Combines a user's harvest history, their on-chain balance, and their
//! capacity ceiling into a live projection of harvestable energy,
//! classified into a four-state capacity machine.
//!
//! ## Capacity states
//!
//! | State | Percentage | Meaning |
//! |-------|------------|---------|
//! | Safe | < 60 | No action needed |
//! | Warning | ≥ 60 | Harvest within the day |
//! | Critical | ≥ 85 | Harvest now |
//! | Overflow | ≥ 100 | Accrual is being wasted |
//!
//! Boundary values belong to the higher tier. The classifier is a pure
//! function of the percentage, recomputed fresh on every call.
//!
//! ## Failure policy
//!
//! Fail open. A dashboard showing "0 energy, safe" beats an error
//! screen: an unreachable log store yields the documented insufficient
//! state, and an unreachable chain reader degrades that one field to its
//! default and downgrades the projection's data quality.

use crate::collaborators::{ChainReader, Degraded, LogStore};
use crate::constants::*;
use crate::log::HarvestLog;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How much history backs a projection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Excellent,
    Good,
    Limited,
    Insufficient,
}

impl DataQuality {
    /// Confidence multiplier applied by the profitability engine
    pub fn confidence_factor(&self) -> f64 {
        match self {
            Self::Excellent => 1.0,
            Self::Good => 0.9,
            Self::Limited => 0.7,
            Self::Insufficient => 0.5,
        }
    }

    /// One step worse; applied once per degraded collaborator
    pub fn downgrade(&self) -> Self {
        match self {
            Self::Excellent => Self::Good,
            Self::Good => Self::Limited,
            Self::Limited | Self::Insufficient => Self::Insufficient,
        }
    }

    /// Quality tier from the number of harvests backing a rate
    pub fn from_sample_count(count: usize) -> Self {
        match count {
            n if n >= 24 => Self::Excellent,
            n if n >= 8 => Self::Good,
            n if n >= 2 => Self::Limited,
            _ => Self::Insufficient,
        }
    }
}

/// Capacity pressure classification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityStatus {
    Safe,
    Warning,
    Critical,
    Overflow,
}

impl CapacityStatus {
    /// Classify a capacity percentage. Evaluated top-down, first match
    /// wins; boundary values belong to the higher tier.
    pub fn classify(percentage: f64) -> Self {
        if percentage >= CAPACITY_OVERFLOW_PCT {
            Self::Overflow
        } else if percentage >= CAPACITY_CRITICAL_PCT {
            Self::Critical
        } else if percentage >= CAPACITY_WARNING_PCT {
            Self::Warning
        } else {
            Self::Safe
        }
    }
}

/// Per-user harvest statistics with the corrected generation rate.
///
/// The rate is derived from harvest-history deltas: energy of every
/// harvest after the user's first, divided by the elapsed time between
/// first and last harvest. The legacy field that stored a cumulative
/// total under a rate label is not reproduced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserHarvestStats {
    /// Account the statistics describe
    pub user: String,

    /// Number of harvests observed
    pub harvest_count: usize,

    /// Lifetime harvested total, micro-units
    pub total_energy_harvested: u64,

    /// Timestamp of the most recent harvest, Unix seconds
    pub last_harvest_timestamp: i64,

    /// Timestamp of the first observed harvest, Unix seconds
    pub first_harvest_timestamp: i64,

    /// Corrected generation rate, micro-units per second
    pub energy_rate_per_second: f64,

    /// Quality tier backing the rate
    pub data_quality: DataQuality,
}

/// Derive a user's harvest statistics from a contract's log collection.
///
/// Needs at least two timestamped harvests spanning a positive interval;
/// returns `None` otherwise (the projector maps that to its insufficient
/// default state).
pub fn user_harvest_stats(
    logs: &[HarvestLog],
    user: &str,
    contract_id: &str,
) -> Option<UserHarvestStats> {
    let mut own: Vec<&HarvestLog> = logs
        .iter()
        .filter(|l| l.sender == user && l.contract_id == contract_id && l.has_timestamp())
        .collect();
    if own.len() < 2 {
        return None;
    }
    own.sort_by_key(|l| (l.block_time, l.block_height));

    let first = own.first()?;
    let last = own.last()?;
    let elapsed = last.block_time - first.block_time;
    if elapsed <= 0 {
        return None;
    }

    // The first harvest anchors the interval; energy accrued before it
    // is outside the observed window.
    let harvested_after_first: u64 = own[1..].iter().map(|l| l.energy).sum();
    let total: u64 = own.iter().map(|l| l.energy).sum();

    Some(UserHarvestStats {
        user: user.to_string(),
        harvest_count: own.len(),
        total_energy_harvested: total,
        last_harvest_timestamp: last.block_time,
        first_harvest_timestamp: first.block_time,
        energy_rate_per_second: harvested_after_first as f64 / elapsed as f64,
        data_quality: DataQuality::from_sample_count(own.len()),
    })
}

/// Live projection of a user's harvestable energy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveAccumulationState {
    /// Account the projection describes
    pub user: String,

    /// Contract the projection describes
    pub contract_id: String,

    /// On-chain balance, micro-units (authoritative)
    pub current_energy_balance: u64,

    /// Accrued since the last harvest: elapsed time × rate, micro-units
    pub accumulated_since_last_harvest: f64,

    /// `min(balance + accumulated, max_capacity)`, micro-units
    pub total_harvestable_energy: f64,

    /// Corrected generation rate, micro-units per second
    pub energy_rate_per_second: f64,

    /// Timestamp of the most recent harvest, Unix seconds
    pub last_harvest_timestamp: i64,

    /// Capacity ceiling, micro-units
    pub max_capacity: u64,

    /// `total_harvestable / max_capacity * 100`
    pub capacity_percentage: f64,

    /// Four-state capacity classification
    pub capacity_status: CapacityStatus,

    /// Quality of the history backing the projection
    pub data_quality: DataQuality,

    /// True at and above the critical boundary
    pub is_harvest_needed: bool,

    /// Rate being lost to the ceiling; 0 unless overflowing
    pub energy_waste_rate: f64,

    /// Seconds until the ceiling at the current rate; infinite when the
    /// rate is 0
    pub time_to_capacity: f64,
}

impl LiveAccumulationState {
    /// Documented safe-default state for a user with no usable history:
    /// all numerics zeroed, default capacity, `Safe`, `Insufficient`.
    pub fn insufficient(user: &str, contract_id: &str) -> Self {
        Self {
            user: user.to_string(),
            contract_id: contract_id.to_string(),
            current_energy_balance: 0,
            accumulated_since_last_harvest: 0.0,
            total_harvestable_energy: 0.0,
            energy_rate_per_second: 0.0,
            last_harvest_timestamp: 0,
            max_capacity: DEFAULT_MAX_CAPACITY,
            capacity_percentage: 0.0,
            capacity_status: CapacityStatus::Safe,
            data_quality: DataQuality::Insufficient,
            is_harvest_needed: false,
            energy_waste_rate: 0.0,
            time_to_capacity: f64::INFINITY,
        }
    }
}

/// Pure projection math over already-resolved inputs.
///
/// The async [`AccumulationProjector`] resolves collaborators and
/// delegates here; callers that already hold balance and capacity can
/// use this directly.
pub fn project_accumulation(
    stats: &UserHarvestStats,
    current_energy_balance: u64,
    max_capacity: u64,
    contract_id: &str,
    data_quality: DataQuality,
    now: i64,
) -> LiveAccumulationState {
    // A zero ceiling would poison the percentage.
    let max_capacity = if max_capacity == 0 {
        DEFAULT_MAX_CAPACITY
    } else {
        max_capacity
    };

    let rate = stats.energy_rate_per_second;
    let time_since_last_harvest = (now - stats.last_harvest_timestamp).max(0) as f64;
    let accumulated_since_last_harvest = time_since_last_harvest * rate;
    let total_harvestable_energy = (current_energy_balance as f64
        + accumulated_since_last_harvest)
        .min(max_capacity as f64);
    let capacity_percentage = total_harvestable_energy / max_capacity as f64 * 100.0;
    let capacity_status = CapacityStatus::classify(capacity_percentage);

    let energy_waste_rate = if capacity_status == CapacityStatus::Overflow {
        rate
    } else {
        0.0
    };
    let time_to_capacity = if rate > 0.0 {
        (max_capacity as f64 - total_harvestable_energy) / rate
    } else {
        f64::INFINITY
    };

    LiveAccumulationState {
        user: stats.user.clone(),
        contract_id: contract_id.to_string(),
        current_energy_balance,
        accumulated_since_last_harvest,
        total_harvestable_energy,
        energy_rate_per_second: rate,
        last_harvest_timestamp: stats.last_harvest_timestamp,
        max_capacity,
        capacity_percentage,
        capacity_status,
        data_quality,
        is_harvest_needed: capacity_percentage >= CAPACITY_CRITICAL_PCT,
        energy_waste_rate,
        time_to_capacity,
    }
}

/// Projects live accumulation for `(user, contract)` pairs.
///
/// Holds the collaborator seams; all math is pure and recomputed fresh
/// on every call.
pub struct AccumulationProjector {
    log_store: Arc<dyn LogStore>,
    chain_reader: Arc<dyn ChainReader>,
    contract_id: String,
}

impl AccumulationProjector {
    pub fn new(
        log_store: Arc<dyn LogStore>,
        chain_reader: Arc<dyn ChainReader>,
        contract_id: impl Into<String>,
    ) -> Self {
        Self {
            log_store,
            chain_reader,
            contract_id: contract_id.into(),
        }
    }

    /// Balance read with the degraded path made explicit. The documented
    /// default on failure is 0.
    pub async fn resolve_balance(&self, account: &str) -> Result<u64, Degraded> {
        self.chain_reader
            .read_balance(account)
            .await
            .map_err(Degraded::from)
    }

    /// Capacity read with the degraded path made explicit. The documented
    /// default on failure (or a reported zero ceiling) is
    /// [`DEFAULT_MAX_CAPACITY`].
    pub async fn resolve_capacity(&self, account: &str) -> Result<u64, Degraded> {
        match self.chain_reader.read_max_capacity(account).await {
            Ok(0) => Err(Degraded::new("chain reader reported zero capacity")),
            Ok(capacity) => Ok(capacity),
            Err(err) => Err(err.into()),
        }
    }

    /// Project a user's live accumulation at an explicit instant.
    ///
    /// Never fails: collaborator trouble degrades to defaults per the
    /// module's failure policy.
    pub async fn project_at(&self, user: &str, now: i64) -> LiveAccumulationState {
        let logs = match self.log_store.fetch_logs(&self.contract_id).await {
            Ok(logs) => logs,
            Err(err) => {
                warn!(user, contract = %self.contract_id, %err, "log store unreachable, projecting insufficient state");
                return LiveAccumulationState::insufficient(user, &self.contract_id);
            }
        };

        let stats = match user_harvest_stats(&logs, user, &self.contract_id) {
            Some(stats) => stats,
            None => {
                debug!(user, contract = %self.contract_id, "not enough harvest history for a rate");
                return LiveAccumulationState::insufficient(user, &self.contract_id);
            }
        };
        let mut quality = stats.data_quality;

        // Neither read depends on the other.
        let (balance, capacity) =
            tokio::join!(self.resolve_balance(user), self.resolve_capacity(user));

        let current_energy_balance = match balance {
            Ok(balance) => balance,
            Err(degraded) => {
                warn!(user, reason = %degraded.reason, "balance degraded to 0");
                quality = quality.downgrade();
                0
            }
        };
        let max_capacity = match capacity {
            Ok(capacity) => capacity,
            Err(degraded) => {
                warn!(user, reason = %degraded.reason, "capacity degraded to default");
                quality = quality.downgrade();
                DEFAULT_MAX_CAPACITY
            }
        };

        let state = project_accumulation(
            &stats,
            current_energy_balance,
            max_capacity,
            &self.contract_id,
            quality,
            now,
        );

        debug!(
            user,
            contract = %self.contract_id,
            percentage = state.capacity_percentage,
            status = ?state.capacity_status,
            "projection computed"
        );

        state
    }

    /// Project against the current wall clock
    pub async fn project(&self, user: &str) -> LiveAccumulationState {
        self.project_at(user, chrono::Utc::now().timestamp()).await
    }
}

/// Short-TTL memoization of projections per `(user, contract)` pair.
///
/// The formulas are idempotent and cheap; the cache only suppresses
/// redundant collaborator round-trips when a display layer polls.
pub struct ProjectionCache {
    ttl: Duration,
    entries: DashMap<(String, String), CachedProjection>,
}

struct CachedProjection {
    computed_at: Instant,
    state: LiveAccumulationState,
}

impl ProjectionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Cache with the default TTL
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(PROJECTION_CACHE_TTL_SECS))
    }

    /// Fresh entry for the pair, if one exists. Entries older than the
    /// TTL are never served.
    pub fn get(&self, user: &str, contract_id: &str) -> Option<LiveAccumulationState> {
        let key = (user.to_string(), contract_id.to_string());
        let entry = self.entries.get(&key)?;
        if entry.computed_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.state.clone())
    }

    pub fn insert(&self, state: LiveAccumulationState) {
        let key = (state.user.clone(), state.contract_id.clone());
        self.entries.insert(
            key,
            CachedProjection {
                computed_at: Instant::now(),
                state,
            },
        );
    }

    /// Drop entries past the TTL
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.computed_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
