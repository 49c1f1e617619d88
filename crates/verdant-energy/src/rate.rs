//! # Rate Calculator
//!
//! Derives per-block and per-hour generation rates from a window of
//! harvest logs, and the theoretical per-token rate from contract
//! economics.
//!
//! The per-hour figure extrapolates from the per-block mean using the
//! modeled 10-minute block interval rather than actual inter-block
//! timestamps; the real-time projector uses true elapsed time instead.

use crate::constants::*;
use crate::log::HarvestLog;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Per-contract generation rate over a sampled time window
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractRateSnapshot {
    /// Contract the snapshot describes
    pub contract_id: String,

    /// Mean energy minted per block, micro-units (blocks with multiple
    /// senders are summed first, then averaged across blocks)
    pub energy_per_block: f64,

    /// Extrapolated hourly rate: `energy_per_block * BLOCKS_PER_HOUR`
    pub energy_per_hour: f64,

    /// Mean distinct harvesters per sampled block
    pub avg_holders_per_block: f64,

    /// Distinct harvesters across the whole window
    pub total_holders: usize,

    /// Number of distinct blocks observed in the window
    pub sampled_blocks: usize,

    /// When the snapshot was computed (not when the data was produced)
    pub last_calculated: i64,
}

impl ContractRateSnapshot {
    /// Zero-valued snapshot for a window with no logs
    pub fn empty(contract_id: &str, now: i64) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            energy_per_block: 0.0,
            energy_per_hour: 0.0,
            avg_holders_per_block: 0.0,
            total_holders: 0,
            sampled_blocks: 0,
            last_calculated: now,
        }
    }
}

/// Compute a contract's rate snapshot over the trailing window ending at
/// `now`. An empty window yields a zero-valued snapshot, never an error.
pub fn contract_rate_snapshot_at(
    logs: &[HarvestLog],
    contract_id: &str,
    time_window_hours: u64,
    now: i64,
) -> ContractRateSnapshot {
    let cutoff = now - (time_window_hours as i64) * 3600;

    // (per-block energy sum, per-block distinct senders)
    let mut blocks: BTreeMap<u64, (u64, HashSet<&str>)> = BTreeMap::new();
    let mut all_holders: HashSet<&str> = HashSet::new();

    for log in logs {
        if log.contract_id != contract_id || log.block_time < cutoff {
            continue;
        }
        let entry = blocks.entry(log.block_height).or_default();
        entry.0 += log.energy;
        entry.1.insert(log.sender.as_str());
        all_holders.insert(log.sender.as_str());
    }

    if blocks.is_empty() {
        return ContractRateSnapshot::empty(contract_id, now);
    }

    let sampled_blocks = blocks.len();
    let total_energy: u64 = blocks.values().map(|(sum, _)| sum).sum();
    let total_block_holders: usize = blocks.values().map(|(_, s)| s.len()).sum();

    let energy_per_block = total_energy as f64 / sampled_blocks as f64;

    ContractRateSnapshot {
        contract_id: contract_id.to_string(),
        energy_per_block,
        energy_per_hour: energy_per_block * BLOCKS_PER_HOUR as f64,
        avg_holders_per_block: total_block_holders as f64 / sampled_blocks as f64,
        total_holders: all_holders.len(),
        sampled_blocks,
        last_calculated: now,
    }
}

/// Convenience wrapper using the current wall clock
pub fn contract_rate_snapshot(
    logs: &[HarvestLog],
    contract_id: &str,
    time_window_hours: u64,
) -> ContractRateSnapshot {
    contract_rate_snapshot_at(
        logs,
        contract_id,
        time_window_hours,
        chrono::Utc::now().timestamp(),
    )
}

/// Theoretical per-second generation rate of one whole token, in
/// micro-units, derived from contract economics:
///
/// `(10^decimals * incentive_score / total_supply) / SECONDS_PER_BLOCK`
///
/// Used to predict generation for balances that have not yet produced
/// log history. Reproduces the issuing contract's accounting (integer
/// semantics aside). A zero or invalid supply yields 0; data-quality
/// flagging is the caller's concern.
pub fn base_rate_per_token(incentive_score: f64, total_supply: f64, token_decimals: u8) -> f64 {
    if !total_supply.is_finite() || total_supply <= 0.0 || !incentive_score.is_finite() {
        return 0.0;
    }
    let one_token_unit = 10f64.powi(token_decimals as i32);
    (one_token_unit * incentive_score / total_supply) / SECONDS_PER_BLOCK as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(sender: &str, height: u64, time: i64, energy: u64) -> HarvestLog {
        HarvestLog {
            sender: sender.into(),
            block_height: height,
            block_time: time,
            energy,
            contract_id: "verdant.energy".into(),
        }
    }

    #[test]
    fn test_empty_window_yields_zero_snapshot() {
        let snapshot = contract_rate_snapshot_at(&[], "verdant.energy", 24, 1_000_000);

        assert_eq!(snapshot.energy_per_block, 0.0);
        assert_eq!(snapshot.energy_per_hour, 0.0);
        assert_eq!(snapshot.sampled_blocks, 0);
        assert_eq!(snapshot.total_holders, 0);
        assert_eq!(snapshot.last_calculated, 1_000_000);
    }

    #[test]
    fn test_per_block_sums_then_mean_across_blocks() {
        // Block 100 has two senders (summed first), block 110 has one.
        let logs = vec![
            log("u1", 100, 900, 40),
            log("u2", 100, 900, 60),
            log("u1", 110, 1500, 200),
        ];
        let snapshot = contract_rate_snapshot_at(&logs, "verdant.energy", 24, 2000);

        // (100 + 200) / 2 blocks
        assert_eq!(snapshot.energy_per_block, 150.0);
        assert_eq!(snapshot.energy_per_hour, 900.0);
        assert_eq!(snapshot.sampled_blocks, 2);
        assert_eq!(snapshot.total_holders, 2);
        assert_eq!(snapshot.avg_holders_per_block, 1.5);
    }

    #[test]
    fn test_window_conservation() {
        // P1: sum of per-block sums equals sum of energy over filtered logs.
        let logs = vec![
            log("u1", 100, 1000, 10),
            log("u2", 100, 1000, 20),
            log("u3", 105, 1300, 30),
            log("u1", 110, 1600, 40),
            log("u1", 50, -90_000, 999), // outside window, excluded
        ];
        let now = 2000;
        let snapshot = contract_rate_snapshot_at(&logs, "verdant.energy", 24, now);

        let cutoff = now - 24 * 3600;
        let filtered_sum: u64 = logs
            .iter()
            .filter(|l| l.block_time >= cutoff)
            .map(|l| l.energy)
            .sum();

        let reconstructed = snapshot.energy_per_block * snapshot.sampled_blocks as f64;
        assert_eq!(reconstructed, filtered_sum as f64);
    }

    #[test]
    fn test_other_contract_logs_excluded() {
        let mut other = log("u1", 100, 1000, 500);
        other.contract_id = "other.energy".into();
        let logs = vec![other, log("u2", 100, 1000, 100)];

        let snapshot = contract_rate_snapshot_at(&logs, "verdant.energy", 24, 2000);
        assert_eq!(snapshot.energy_per_block, 100.0);
        assert_eq!(snapshot.total_holders, 1);
    }

    #[test]
    fn test_base_rate_per_token() {
        // 10^6 * 1.0 / 1_000_000 supply = 1 micro-unit per block
        // => 1/600 micro-units per second
        let rate = base_rate_per_token(1.0, 1_000_000.0, 6);
        assert!((rate - 1.0 / 600.0).abs() < 1e-12);
    }

    #[test]
    fn test_base_rate_zero_supply_is_zero() {
        assert_eq!(base_rate_per_token(1.0, 0.0, 6), 0.0);
        assert_eq!(base_rate_per_token(1.0, -5.0, 6), 0.0);
        assert_eq!(base_rate_per_token(f64::NAN, 100.0, 6), 0.0);
    }
}
