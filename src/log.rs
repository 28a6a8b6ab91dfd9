//! Log contract — the persistence boundary.
//!
//! The manager owns no durable state of its own; every durability
//! requirement in this crate is delegated to a `Log` implementation.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;

use crate::error::LogError;
use crate::types::Transaction;

/// Abstract persistent store for transaction records plus a coarse,
/// coordinator-wide advisory lock.
///
/// All methods must be durable before returning: a caller observing
/// `Ok` from `create_tx`, `tx_update`, or `tx_submit` must be able to rely
/// on the write surviving a coordinator crash.
#[async_trait]
pub trait Log: Send + Sync {
    /// Allocate a globally unique transaction ID and persist a new
    /// `Transaction` with every given participant recorded as `Hanging`.
    async fn create_tx(&self, participant_ids: &[String]) -> Result<String, LogError>;

    /// Update one participant's Try outcome for `tx_id`.
    async fn tx_update(&self, tx_id: &str, participant_id: &str, accept: bool) -> Result<(), LogError>;

    /// Fetch a transaction by ID.
    async fn get_tx(&self, tx_id: &str) -> Result<Transaction, LogError>;

    /// Transition a transaction to a terminal status. Idempotent:
    /// submitting an already-terminal transaction with the same outcome is
    /// a no-op.
    async fn tx_submit(&self, tx_id: &str, success: bool) -> Result<(), LogError>;

    /// All transactions still in `Hanging` status per this log's view.
    async fn get_hanging_txs(&self) -> Result<Vec<Transaction>, LogError>;

    /// Acquire the coordinator-wide advisory lock with lease
    /// `expire_duration`. Returns an error (rather than blocking) if the
    /// lock is already held elsewhere.
    async fn lock(&self, expire_duration: ChronoDuration) -> Result<(), LogError>;

    /// Release the lock held by this coordinator.
    async fn unlock(&self) -> Result<(), LogError>;
}
