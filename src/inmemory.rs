//! In-memory `Log` implementation.
//!
//! The simplest possible `Log`: suitable for unit tests, doctests, and
//! single-process development — not for a coordinator that needs to
//! survive a restart or be shared across processes. Modeled after the
//! embedding application's `InMemoryTransport`, which plays the same role
//! for its own pluggable transport trait.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::error::LogError;
use crate::log::Log;
use crate::types::{ParticipantTryEntity, Transaction, TryStatus};

struct Lease {
    held_until: DateTime<Utc>,
}

/// A transaction plus the bookkeeping the log itself needs but that isn't
/// part of the logical `Transaction` record: whether `tx_submit` has
/// already been called. `get_hanging_txs` is defined entirely in terms of
/// this bit — a transaction whose participants are all `Successful` but
/// that hasn't been submitted yet is still "hanging" from the log's point
/// of view, because nobody has told it the outcome is final (this is
/// exactly the case the reconciliation loop exists to pick up).
struct StoredTx {
    tx: Transaction,
    submitted: bool,
}

#[derive(Default)]
struct State {
    transactions: HashMap<String, StoredTx>,
    lease: Option<Lease>,
}

/// `Mutex`-backed, process-local `Log`.
pub struct InMemoryLog {
    state: Mutex<State>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

impl Default for InMemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Log for InMemoryLog {
    async fn create_tx(&self, participant_ids: &[String]) -> Result<String, LogError> {
        let tx_id = uuid::Uuid::new_v4().to_string();
        let tx = Transaction {
            tx_id: tx_id.clone(),
            created_at: Utc::now(),
            participants: participant_ids
                .iter()
                .map(|id| ParticipantTryEntity {
                    participant_id: id.clone(),
                    try_status: TryStatus::Hanging,
                })
                .collect(),
        };
        self.state
            .lock()
            .unwrap()
            .transactions
            .insert(tx_id.clone(), StoredTx { tx, submitted: false });
        Ok(tx_id)
    }

    async fn tx_update(&self, tx_id: &str, participant_id: &str, accept: bool) -> Result<(), LogError> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .transactions
            .get_mut(tx_id)
            .ok_or_else(|| LogError::from(NotFound(tx_id.to_string())))?;
        for p in stored.tx.participants.iter_mut() {
            if p.participant_id == participant_id {
                p.try_status = if accept { TryStatus::Successful } else { TryStatus::Failure };
                return Ok(());
            }
        }
        Err(NotFound(format!("{tx_id}/{participant_id}")).into())
    }

    async fn get_tx(&self, tx_id: &str) -> Result<Transaction, LogError> {
        self.state
            .lock()
            .unwrap()
            .transactions
            .get(tx_id)
            .map(|stored| stored.tx.clone())
            .ok_or_else(|| NotFound(tx_id.to_string()).into())
    }

    async fn tx_submit(&self, tx_id: &str, _success: bool) -> Result<(), LogError> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .transactions
            .get_mut(tx_id)
            .ok_or_else(|| LogError::from(NotFound(tx_id.to_string())))?;
        stored.submitted = true;
        Ok(())
    }

    async fn get_hanging_txs(&self) -> Result<Vec<Transaction>, LogError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .values()
            .filter(|stored| !stored.submitted)
            .map(|stored| stored.tx.clone())
            .collect())
    }

    async fn lock(&self, expire_duration: ChronoDuration) -> Result<(), LogError> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        if let Some(lease) = &state.lease {
            if lease.held_until > now {
                return Err(AlreadyLocked.into());
            }
        }
        state.lease = Some(Lease {
            held_until: now + expire_duration,
        });
        Ok(())
    }

    async fn unlock(&self) -> Result<(), LogError> {
        self.state.lock().unwrap().lease = None;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("transaction not found: {0}")]
struct NotFound(String);

#[derive(Debug, thiserror::Error)]
#[error("log is already locked")]
struct AlreadyLocked;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let log = InMemoryLog::new();
        let tx_id = log.create_tx(&["a".into(), "b".into()]).await.unwrap();
        let tx = log.get_tx(&tx_id).await.unwrap();
        assert_eq!(tx.participants.len(), 2);
        assert!(tx.participants.iter().all(|p| p.try_status == TryStatus::Hanging));
    }

    #[tokio::test]
    async fn unsubmitted_tx_is_hanging_even_when_all_successful() {
        let log = InMemoryLog::new();
        let tx_id = log.create_tx(&["a".into()]).await.unwrap();
        log.tx_update(&tx_id, "a", true).await.unwrap();
        let hanging = log.get_hanging_txs().await.unwrap();
        assert_eq!(hanging.len(), 1);
        assert_eq!(hanging[0].tx_id, tx_id);
    }

    #[tokio::test]
    async fn submitted_tx_is_no_longer_hanging() {
        let log = InMemoryLog::new();
        let tx_id = log.create_tx(&["a".into()]).await.unwrap();
        log.tx_update(&tx_id, "a", true).await.unwrap();
        log.tx_submit(&tx_id, true).await.unwrap();
        assert!(log.get_hanging_txs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lock_excludes_concurrent_holder() {
        let log = InMemoryLog::new();
        log.lock(ChronoDuration::seconds(10)).await.unwrap();
        assert!(log.lock(ChronoDuration::seconds(10)).await.is_err());
        log.unlock().await.unwrap();
        assert!(log.lock(ChronoDuration::seconds(10)).await.is_ok());
    }

    #[tokio::test]
    async fn lease_expires() {
        let log = InMemoryLog::new();
        log.lock(ChronoDuration::milliseconds(-1)).await.unwrap();
        // Lease already expired, so a fresh lock should succeed.
        assert!(log.lock(ChronoDuration::seconds(1)).await.is_ok());
    }

    #[tokio::test]
    async fn tx_submit_is_idempotent() {
        let log = InMemoryLog::new();
        let tx_id = log.create_tx(&["a".into()]).await.unwrap();
        log.tx_submit(&tx_id, true).await.unwrap();
        log.tx_submit(&tx_id, true).await.unwrap();
        assert!(log.get_hanging_txs().await.unwrap().is_empty());
    }
}
