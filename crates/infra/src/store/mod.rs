//! Record stores.
//!
//! Traits describe what the ledger and services need from persistence; the
//! in-memory implementations back tests, the CLI and local development.

pub mod batch;
pub mod prediction;

pub use batch::{BatchOrder, BatchQuery, BatchStats, BatchStore, InMemoryBatchStore};
pub use prediction::{AgentRef, InMemoryPredictionStore, PredictionRecord, PredictionStore};

/// Store error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    AlreadyExists(String),
    /// Optimistic version check failed; the caller worked on a stale copy.
    #[error("version conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Storage("lock poisoned".to_string())
    }
}
