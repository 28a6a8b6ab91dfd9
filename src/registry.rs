//! Participant registry — in-process ID → participant mapping.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::TccError;
use crate::participant::Participant;

/// Concurrent-safe ID → participant map. Registration is typically a
/// startup-only operation but remains safe to call throughout the
/// manager's lifetime; lookups may run concurrently with registration.
#[derive(Clone, Default)]
pub struct Registry {
    participants: Arc<RwLock<HashMap<String, Arc<dyn Participant>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant. Fails with [`TccError::DuplicateId`] if its
    /// ID is already present.
    pub async fn register(&self, participant: Arc<dyn Participant>) -> Result<(), TccError> {
        let id = participant.id().to_string();
        let mut participants = self.participants.write().await;
        if participants.contains_key(&id) {
            return Err(TccError::DuplicateId(id));
        }
        participants.insert(id, participant);
        Ok(())
    }

    /// Resolve a set of IDs to their participants, preserving request
    /// order. Fails with [`TccError::UnknownId`] on the first ID not found.
    pub async fn lookup(&self, ids: &[String]) -> Result<Vec<Arc<dyn Participant>>, TccError> {
        let participants = self.participants.read().await;
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            let participant = participants
                .get(id)
                .cloned()
                .ok_or_else(|| TccError::UnknownId(id.clone()))?;
            resolved.push(participant);
        }
        Ok(resolved)
    }

    /// Resolve a single ID. Used by the reconciliation loop, which only
    /// ever needs one participant at a time.
    pub async fn lookup_one(&self, id: &str) -> Result<Arc<dyn Participant>, TccError> {
        self.participants
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TccError::UnknownId(id.to_string()))
    }
}
