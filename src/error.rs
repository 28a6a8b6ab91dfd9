//! Error types for the coordinator
//!
//! `Log` and `Participant` implementations fail with whatever error type
//! they like; `LogError`/`ParticipantError` erase that down to a boxed
//! `std::error::Error` so the coordinator can propagate failures without
//! knowing anything about its collaborators' concrete error types.

use std::fmt;

/// Primary error type returned by the coordinator's public API.
#[derive(Debug, thiserror::Error)]
pub enum TccError {
    /// Registration of a participant whose ID is already registered.
    #[error("duplicate participant id: {0}")]
    DuplicateId(String),

    /// A transaction referenced a participant not in the registry.
    #[error("unknown participant id: {0}")]
    UnknownId(String),

    /// `transaction()` was called with no requests.
    #[error("transaction called with no requests")]
    EmptyTask,

    /// The same participant ID appeared twice in one `transaction()` call.
    #[error("duplicate request for participant: {0}")]
    DuplicateRequest(String),

    /// A call into the `Log` failed.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// A participant's Try/Confirm/Cancel failed. Not surfaced to the
    /// caller of `transaction()` (see propagation policy); used internally
    /// by the reconciliation loop and reported via tracing.
    #[error("participant {participant_id} failed: {source}")]
    Participant {
        participant_id: String,
        #[source]
        source: ParticipantError,
    },
}

/// Opaque error from a `Log` implementation.
#[derive(Debug)]
pub struct LogError(Box<dyn std::error::Error + Send + Sync>);

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for LogError {
    fn from(err: E) -> Self {
        LogError(Box::new(err))
    }
}

/// Opaque error from a `Participant` implementation.
#[derive(Debug)]
pub struct ParticipantError(Box<dyn std::error::Error + Send + Sync>);

impl fmt::Display for ParticipantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParticipantError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for ParticipantError {
    fn from(err: E) -> Self {
        ParticipantError(Box::new(err))
    }
}

impl ParticipantError {
    /// A nack with no underlying error (e.g. `ack: false`, `err: nil`).
    pub fn nack(reason: impl Into<String>) -> Self {
        ParticipantError(Box::new(NackError(reason.into())))
    }
}

#[derive(Debug)]
struct NackError(String);

impl fmt::Display for NackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NackError {}

pub type Result<T> = std::result::Result<T, TccError>;
