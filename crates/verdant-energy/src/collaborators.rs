//! # Collaborator Seams
//!
//! External systems this engine depends on: the harvest log store and the
//! read-only chain reader. Both are injected as trait objects; the engine
//! performs no I/O of its own.
//!
//! Collaborator failures never reach the dashboard as errors. Every call
//! site converts a failure into a documented default via [`Degraded`],
//! downgrading the projection's data quality instead of propagating.

use crate::log::HarvestLog;
use async_trait::async_trait;

/// Failure raised by a collaborator (log store, RPC reader)
#[derive(Clone, Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("log store unavailable: {0}")]
    LogStore(String),

    #[error("chain read failed: {0}")]
    ChainRead(String),

    #[error("collaborator timed out")]
    Timeout,
}

/// A collaborator failure that has been resolved to a default value.
///
/// Returned by the projector's boundary helpers so the degraded path is
/// distinctly assertable in tests, rather than a silent catch-and-zero.
#[derive(Clone, Debug, thiserror::Error)]
#[error("degraded to default: {reason}")]
pub struct Degraded {
    /// What failed and why the default was applied
    pub reason: String,
}

impl Degraded {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<CollaboratorError> for Degraded {
    fn from(err: CollaboratorError) -> Self {
        Self::new(err.to_string())
    }
}

/// Harvest log store (host-side persistence, indexer, or RPC scan)
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Fetch all harvest logs for a contract. No ordering guarantee;
    /// the engine sorts as needed.
    async fn fetch_logs(&self, contract_id: &str) -> Result<Vec<HarvestLog>, CollaboratorError>;
}

/// Read-only on-chain reader
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current energy balance of an account, in micro-units
    async fn read_balance(&self, account: &str) -> Result<u64, CollaboratorError>;

    /// Maximum energy capacity of an account, in micro-units
    async fn read_max_capacity(&self, account: &str) -> Result<u64, CollaboratorError>;
}
