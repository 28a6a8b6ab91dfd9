//! Participant contract — the resource-manager extension point.
//!
//! A `Participant` is a resource manager exposing the three TCC
//! operations. Implementations are expected to wrap a network client
//! (HTTP, gRPC, ...); none of that transport is this crate's concern.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ParticipantError;

/// Opaque per-participant request payload. The coordinator never inspects
/// its contents — semantics are defined entirely by the participant.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Request passed to `Participant::try_reserve`.
#[derive(Debug, Clone)]
pub struct TryRequest {
    pub participant_id: String,
    pub tx_id: String,
    pub payload: Payload,
}

/// Response from any of the three participant operations.
#[derive(Debug, Clone)]
pub struct ParticipantResponse {
    pub participant_id: String,
    pub tx_id: String,
    pub ack: bool,
}

/// A resource manager participating in a TCC transaction.
///
/// All three operations take a [`CancellationToken`] and must return
/// promptly once it is cancelled. `confirm` and `cancel` must be
/// idempotent: the coordinator may call either more than once for the same
/// `tx_id` under retry, and `cancel` must tolerate a `tx_id` that never saw
/// a successful `try_reserve` on this participant (the "empty-rollback"
/// case), resolving to `ack: true`.
#[async_trait]
pub trait Participant: Send + Sync {
    /// Stable identifier, unique within one coordinator instance.
    fn id(&self) -> &str;

    /// Reserve resources for `req.tx_id`. On `Ok(resp)` with `resp.ack ==
    /// true` the participant promises a later `confirm` for this `tx_id`
    /// will succeed barring catastrophic failure. Any `Err`, or `Ok` with
    /// `ack == false`, means nothing was reserved and the transaction must
    /// cancel. Safe to call at most once per `tx_id`; the coordinator
    /// guarantees it will not issue a duplicate Try under normal operation.
    async fn try_reserve(
        &self,
        cancellation: CancellationToken,
        req: TryRequest,
    ) -> Result<ParticipantResponse, ParticipantError>;

    /// Idempotently commit the reservation made for `tx_id`.
    async fn confirm(
        &self,
        cancellation: CancellationToken,
        tx_id: &str,
    ) -> Result<ParticipantResponse, ParticipantError>;

    /// Idempotently release any reservation made for `tx_id`, including the
    /// empty-rollback case where no Try ever reserved anything.
    async fn cancel(
        &self,
        cancellation: CancellationToken,
        tx_id: &str,
    ) -> Result<ParticipantResponse, ParticipantError>;
}
