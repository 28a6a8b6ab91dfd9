//! Data model shared between the registry, the log, and the manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::participant::Payload;

/// Caller input: one participant ID plus its opaque request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEntity {
    pub participant_id: String,
    pub payload: Payload,
}

impl RequestEntity {
    pub fn new(participant_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            participant_id: participant_id.into(),
            payload,
        }
    }
}

/// Outcome of the Try phase for one participant, as tracked by the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryStatus {
    Hanging,
    Successful,
    Failure,
}

/// Log-internal record of one participant's Try outcome within a
/// transaction.
#[derive(Debug, Clone)]
pub struct ParticipantTryEntity {
    pub participant_id: String,
    pub try_status: TryStatus,
}

/// Derived, overall status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Hanging,
    Successful,
    Failure,
}

/// A transaction record as persisted by the log.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub tx_id: String,
    pub participants: Vec<ParticipantTryEntity>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Status derivation rule: a transaction older than
    /// `created_before` is ruled a failure outright regardless of its
    /// participants' Try outcomes (the Timeout-honesty invariant);
    /// otherwise any single `Failure` makes the whole transaction a
    /// failure, any non-`Successful` entry leaves it `Hanging`, and only
    /// unanimous `Successful` entries make it `Successful`.
    pub fn status(&self, created_before: DateTime<Utc>) -> TxStatus {
        if self.created_at < created_before {
            return TxStatus::Failure;
        }
        let mut hanging = false;
        for p in &self.participants {
            match p.try_status {
                TryStatus::Failure => return TxStatus::Failure,
                TryStatus::Successful => {}
                TryStatus::Hanging => hanging = true,
            }
        }
        if hanging {
            TxStatus::Hanging
        } else {
            TxStatus::Successful
        }
    }
}
