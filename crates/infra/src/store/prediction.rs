//! Stored predictions.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use alutrack_ai::{PredictionInput, PredictionResult};
use alutrack_core::{Entity, PredictionId, UserId};

use super::StoreError;

/// Agent a prediction is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRef {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

/// One estimate as it was made: inputs, outputs, who asked and when.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: PredictionId,
    /// `None` when the submitter was not a known agent.
    pub agent: Option<AgentRef>,
    pub input: PredictionInput,
    pub result: PredictionResult,
    pub created_at: DateTime<Utc>,
}

impl Entity for PredictionRecord {
    type Id = PredictionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Prediction store abstraction.
pub trait PredictionStore: Send + Sync {
    fn insert(&self, record: PredictionRecord) -> Result<(), StoreError>;

    fn get(&self, id: PredictionId) -> Result<Option<PredictionRecord>, StoreError>;

    /// Newest first, at most `limit` records.
    fn list_recent(&self, limit: usize) -> Result<Vec<PredictionRecord>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;

    /// Remove and return the record; `None` if it was not stored.
    fn delete(&self, id: PredictionId) -> Result<Option<PredictionRecord>, StoreError>;
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<PredictionId, (u64, PredictionRecord)>,
    seq: u64,
}

/// In-memory prediction store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPredictionStore {
    inner: RwLock<Inner>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PredictionStore for InMemoryPredictionStore {
    fn insert(&self, record: PredictionRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if inner.rows.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(format!("prediction {}", record.id)));
        }
        inner.seq += 1;
        let seq = inner.seq;
        inner.rows.insert(record.id, (seq, record));
        Ok(())
    }

    fn get(&self, id: PredictionId) -> Result<Option<PredictionRecord>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(inner.rows.get(&id).map(|(_, r)| r.clone()))
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<PredictionRecord>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::poisoned())?;
        let mut rows: Vec<&(u64, PredictionRecord)> = inner.rows.values().collect();
        rows.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(inner.rows.len())
    }

    fn delete(&self, id: PredictionId) -> Result<Option<PredictionRecord>, StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::poisoned())?;
        Ok(inner.rows.remove(&id).map(|(_, r)| r))
    }
}
