//! Transaction Manager — the state machine.
//!
//! Ties the registry, the log, and the participant contract together: it
//! fans Try calls out to every participant in a transaction, then leaves
//! Confirm/Cancel to the background reconciliation loop rather than driving
//! them inline.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{ParticipantError, TccError};
use crate::log::Log;
use crate::participant::{Participant, TryRequest};
use crate::registry::Registry;
use crate::types::{RequestEntity, Transaction, TxStatus};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MONITOR_TICK: Duration = Duration::from_secs(10);
const BACKOFF_CEILING_FACTOR: u32 = 8;

/// Explicit configuration for a [`TransactionManager`]. Non-positive
/// durations have no representation in `std::time::Duration` (it is
/// unsigned), so the only clamp that can fire in Rust is the zero case —
/// the functional equivalent of the source's "non-positive" clamp.
#[derive(Debug, Clone, Copy)]
pub struct ManagerConfig {
    pub timeout: Duration,
    pub monitor_tick: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            monitor_tick: DEFAULT_MONITOR_TICK,
        }
    }
}

impl ManagerConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() { DEFAULT_TIMEOUT } else { timeout };
        self
    }

    pub fn with_monitor_tick(mut self, monitor_tick: Duration) -> Self {
        self.monitor_tick = if monitor_tick.is_zero() {
            DEFAULT_MONITOR_TICK
        } else {
            monitor_tick
        };
        self
    }

    fn timeout_chrono(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.timeout).unwrap_or_else(|_| ChronoDuration::seconds(5))
    }
}

/// The coordinator. Owns a [`Registry`] of participants and a handle to a
/// [`Log`]; spawns its own reconciliation loop on construction.
pub struct TransactionManager {
    registry: Registry,
    log: Arc<dyn Log>,
    config: ManagerConfig,
    shutdown: CancellationToken,
}

impl TransactionManager {
    /// Construct a manager and start its background reconciliation loop.
    pub fn new(log: Arc<dyn Log>, config: ManagerConfig) -> Arc<Self> {
        let shutdown = CancellationToken::new();
        let manager = Arc::new(Self {
            registry: Registry::new(),
            log,
            config,
            shutdown,
        });

        let loop_registry = manager.registry.clone();
        let loop_log = manager.log.clone();
        let loop_shutdown = manager.shutdown.clone();
        tokio::spawn(reconciliation_loop(loop_registry, loop_log, config, loop_shutdown));

        manager
    }

    /// Register a participant with the manager's registry.
    pub async fn register(&self, participant: Arc<dyn Participant>) -> Result<(), TccError> {
        self.registry.register(participant).await
    }

    /// The synchronous entry point. Does not drive Confirm/Cancel —
    /// terminal resolution is left to the reconciliation loop.
    #[tracing::instrument(skip(self, cancellation, requests), fields(tx_id = tracing::field::Empty))]
    pub async fn transaction(
        &self,
        cancellation: CancellationToken,
        requests: Vec<RequestEntity>,
    ) -> Result<bool, TccError> {
        if requests.is_empty() {
            return Err(TccError::EmptyTask);
        }

        let mut seen = HashSet::with_capacity(requests.len());
        let mut ids = Vec::with_capacity(requests.len());
        for req in &requests {
            if !seen.insert(req.participant_id.clone()) {
                return Err(TccError::DuplicateRequest(req.participant_id.clone()));
            }
            ids.push(req.participant_id.clone());
        }

        let participants = self.registry.lookup(&ids).await?;
        if participants.len() != requests.len() {
            tracing::error!(
                requested = requests.len(),
                resolved = participants.len(),
                "registry resolved a different number of participants than requested"
            );
            return Err(TccError::UnknownId("participant count mismatch".into()));
        }

        let tx_id = self.log.create_tx(&ids).await.map_err(TccError::Log)?;
        tracing::Span::current().record("tx_id", tracing::field::display(&tx_id));

        let success = self
            .try_fan_out(cancellation, tx_id, participants, requests)
            .await;
        Ok(success)
    }

    /// Stop the reconciliation loop. Idempotent.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    async fn try_fan_out(
        &self,
        cancellation: CancellationToken,
        tx_id: String,
        participants: Vec<Arc<dyn Participant>>,
        requests: Vec<RequestEntity>,
    ) -> bool {
        let mut payloads: std::collections::HashMap<String, crate::participant::Payload> = requests
            .into_iter()
            .map(|req| (req.participant_id, req.payload))
            .collect();

        // Subordinate to the caller's token: cancelling it cancels every Try
        // task, but cancelling it back does not reach the caller's own token.
        let fanout_token = cancellation.child_token();
        let (failure_tx, mut failure_rx) = mpsc::channel::<()>(participants.len().max(1));

        for participant in participants {
            let payload = payloads.remove(participant.id()).unwrap_or_default();
            let tx_id = tx_id.clone();
            let log = self.log.clone();
            let failure_tx = failure_tx.clone();
            let token = fanout_token.clone();

            tokio::spawn(async move {
                let participant_id = participant.id().to_string();
                let req = TryRequest {
                    participant_id: participant_id.clone(),
                    tx_id: tx_id.clone(),
                    payload,
                };
                let result = participant.try_reserve(token, req).await;
                let accept = match &result {
                    Ok(resp) => resp.ack,
                    Err(_) => false,
                };

                if let Err(e) = log.tx_update(&tx_id, &participant_id, accept).await {
                    tracing::warn!(participant = %participant_id, error = %e, "failed to record try outcome");
                    let _ = failure_tx.try_send(());
                    return;
                }

                if !accept {
                    tracing::warn!(participant = %participant_id, "participant try failed");
                    let _ = failure_tx.try_send(());
                }
            });
        }
        drop(failure_tx);

        let sleep = tokio::time::sleep(self.config.timeout);
        tokio::pin!(sleep);

        let success = tokio::select! {
            biased;
            _ = cancellation.cancelled() => false,
            maybe_failure = failure_rx.recv() => maybe_failure.is_none(),
            _ = &mut sleep => false,
        };

        if !success {
            fanout_token.cancel();
        }
        success
    }
}

impl Drop for TransactionManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn reconciliation_loop(
    registry: Registry,
    log: Arc<dyn Log>,
    config: ManagerConfig,
    shutdown: CancellationToken,
) {
    let mut tick = config.monitor_tick;
    let mut last_error = false;

    loop {
        tick = if last_error {
            backoff_tick(tick, config.monitor_tick)
        } else {
            config.monitor_tick
        };

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(tick) => {}
        }

        let lease = ChronoDuration::from_std(config.monitor_tick)
            .unwrap_or_else(|_| ChronoDuration::seconds(10));
        if let Err(e) = log.lock(lease).await {
            tracing::debug!(error = %e, "reconciliation lock held elsewhere, deferring");
            last_error = false;
            continue;
        }

        let txs = match log.get_hanging_txs().await {
            Ok(txs) => txs,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list hanging transactions");
                let _ = log.unlock().await;
                last_error = true;
                continue;
            }
        };

        let result = advance_all(&registry, &log, &config, txs).await;
        let _ = log.unlock().await;

        if let Err(e) = &result {
            tracing::warn!(error = %e, "reconciliation iteration failed");
        }
        last_error = result.is_err();
    }
}

fn backoff_tick(current: Duration, base: Duration) -> Duration {
    let ceiling = base * BACKOFF_CEILING_FACTOR;
    let doubled = current.saturating_mul(2);
    if doubled > ceiling {
        ceiling
    } else {
        doubled
    }
}

async fn advance_all(
    registry: &Registry,
    log: &Arc<dyn Log>,
    config: &ManagerConfig,
    txs: Vec<Transaction>,
) -> Result<(), TccError> {
    let mut handles = Vec::with_capacity(txs.len());
    for tx in txs {
        let registry = registry.clone();
        let log = log.clone();
        let created_before = chrono::Utc::now() - config.timeout_chrono();
        handles.push(tokio::spawn(async move {
            advance_progress(&registry, log.as_ref(), &tx, created_before).await
        }));
    }

    let mut first_err = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
            Err(join_error) => {
                tracing::error!(error = %join_error, "advance_progress task panicked");
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Sequential Confirm/Cancel fan-out for one transaction: a deliberate
/// safety choice over concurrent fan-out, since it preserves clear error
/// attribution and lets the loop resume from any participant on the next
/// tick.
#[tracing::instrument(skip(registry, log, tx), fields(tx_id = %tx.tx_id))]
async fn advance_progress(
    registry: &Registry,
    log: &dyn Log,
    tx: &Transaction,
    created_before: chrono::DateTime<chrono::Utc>,
) -> Result<(), TccError> {
    let status = tx.status(created_before);
    let success = match status {
        TxStatus::Hanging => return Ok(()),
        TxStatus::Successful => true,
        TxStatus::Failure => false,
    };

    for entry in &tx.participants {
        let participant = registry.lookup_one(&entry.participant_id).await?;
        let token = CancellationToken::new();
        let result = if success {
            participant.confirm(token, &tx.tx_id).await
        } else {
            participant.cancel(token, &tx.tx_id).await
        };

        let resp = result.map_err(|source| TccError::Participant {
            participant_id: entry.participant_id.clone(),
            source,
        })?;

        if !resp.ack {
            tracing::warn!(participant = %entry.participant_id, action = if success { "confirm" } else { "cancel" }, "not acked, retrying next tick");
            return Err(TccError::Participant {
                participant_id: entry.participant_id.clone(),
                source: ParticipantError::nack("not acked"),
            });
        }
    }

    log.tx_submit(&tx.tx_id, success).await.map_err(TccError::Log)
}
