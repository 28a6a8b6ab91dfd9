//! A Try–Confirm–Cancel distributed transaction coordinator.
//!
//! Embed a [`TransactionManager`] inside a host process to orchestrate
//! atomic operations across independently-failing resource managers, each
//! implementing the [`Participant`] contract. The manager delegates all
//! durable state to a [`Log`] implementation — this crate ships
//! [`InMemoryLog`] for tests and single-process use, but production
//! deployments plug in their own.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tcc_core::{InMemoryLog, ManagerConfig, RequestEntity, TransactionManager};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(manager: Arc<TransactionManager>) -> Result<(), tcc_core::TccError> {
//! let requests = vec![RequestEntity::new("inventory", Default::default())];
//! let committed = manager.transaction(CancellationToken::new(), requests).await?;
//! # let _ = committed;
//! # Ok(())
//! # }
//! ```

mod error;
mod inmemory;
mod log;
mod manager;
mod participant;
mod registry;
mod types;

pub use error::{LogError, ParticipantError, Result, TccError};
pub use inmemory::InMemoryLog;
pub use log::Log;
pub use manager::{ManagerConfig, TransactionManager};
pub use participant::{Participant, ParticipantResponse, Payload, TryRequest};
pub use registry::Registry;
pub use types::{ParticipantTryEntity, RequestEntity, Transaction, TryStatus, TxStatus};
