//! By-product batch storage.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::Serialize;

use alutrack_byproducts::{BatchEvent, BatchStatus, ByProductBatch};
use alutrack_core::{AggregateRoot, BatchId, ExpectedVersion, PredictionId};
use alutrack_events::EventEnvelope;

use super::StoreError;

/// Stream type recorded on every batch event envelope.
pub const BATCH_AGGREGATE_TYPE: &str = "byproduct.batch";

/// Sort order for batch listings. Both orders are newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchOrder {
    #[default]
    CreatedDesc,
    UpdatedDesc,
}

/// Filter + order + limit for batch listings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchQuery {
    /// Empty means every status.
    pub statuses: Vec<BatchStatus>,
    pub order: BatchOrder,
    pub limit: Option<usize>,
}

impl BatchQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_status(status: Option<BatchStatus>) -> Self {
        Self {
            statuses: status.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Batches the processing team has touched, most recently updated first.
    pub fn processed() -> Self {
        Self {
            statuses: vec![BatchStatus::InProcess, BatchStatus::Used],
            order: BatchOrder::UpdatedDesc,
            limit: None,
        }
    }

    pub fn order_by(mut self, order: BatchOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, batch: &ByProductBatch) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&batch.status())
    }
}

/// Aggregate figures over every stored batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    /// Always holds all three statuses.
    pub counts: BTreeMap<BatchStatus, usize>,
    pub total_quantity_kg: f64,
}

impl Default for BatchStats {
    fn default() -> Self {
        Self {
            total: 0,
            counts: BatchStatus::ALL.iter().map(|s| (*s, 0)).collect(),
            total_quantity_kg: 0.0,
        }
    }
}

/// Batch store abstraction.
pub trait BatchStore: Send + Sync {
    /// Persist the new state of a batch together with the events that
    /// produced it, all or nothing.
    ///
    /// `expected` is checked against the stored version before writing:
    /// `New` for a fresh batch, `Exact(v)` for an update of a copy read at
    /// version `v`. An empty `events` slice writes nothing.
    fn save(
        &self,
        batch: &ByProductBatch,
        events: &[BatchEvent],
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    fn get(&self, id: BatchId) -> Result<Option<ByProductBatch>, StoreError>;

    fn list(&self, query: &BatchQuery) -> Result<Vec<ByProductBatch>, StoreError>;

    /// Batches whose back-link points at `prediction_id`.
    fn find_by_source(&self, prediction_id: PredictionId)
    -> Result<Vec<ByProductBatch>, StoreError>;

    /// Event history of one batch in stream order. Empty for unknown ids.
    fn history(&self, id: BatchId) -> Result<Vec<EventEnvelope<BatchEvent>>, StoreError>;

    fn stats(&self) -> Result<BatchStats, StoreError>;
}

#[derive(Debug)]
struct BatchRow {
    batch: ByProductBatch,
    /// Write sequence at insertion; breaks `created_at` ties.
    inserted: u64,
    /// Write sequence of the latest save; breaks `updated_at` ties.
    written: u64,
    history: Vec<EventEnvelope<BatchEvent>>,
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<BatchId, BatchRow>,
    seq: u64,
}

/// In-memory batch store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryBatchStore {
    inner: RwLock<Inner>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn wrap_events(
    id: BatchId,
    start: u64,
    events: &[BatchEvent],
) -> impl Iterator<Item = EventEnvelope<BatchEvent>> + '_ {
    events.iter().enumerate().map(move |(i, e)| {
        EventEnvelope::wrap(*id.as_uuid(), BATCH_AGGREGATE_TYPE, start + i as u64 + 1, e.clone())
    })
}

impl BatchStore for InMemoryBatchStore {
    fn save(
        &self,
        batch: &ByProductBatch,
        events: &[BatchEvent],
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut guard = self.inner.write().map_err(|_| StoreError::poisoned())?;
        let inner = &mut *guard;
        let id = batch.id_typed();

        let current = inner.rows.get(&id).map(|r| r.batch.version());
        expected
            .check(current)
            .map_err(|e| StoreError::Conflict(format!("batch {id}: {e}")))?;

        let expected_next = current.unwrap_or(0) + events.len() as u64;
        if batch.version() != expected_next {
            return Err(StoreError::Conflict(format!(
                "batch {id}: snapshot version {} does not follow stored version {current:?}",
                batch.version()
            )));
        }

        inner.seq += 1;
        let seq = inner.seq;

        match inner.rows.get_mut(&id) {
            Some(row) => {
                let start = row.history.len() as u64;
                row.history.extend(wrap_events(id, start, events));
                row.batch = batch.clone();
                row.written = seq;
            }
            None => {
                inner.rows.insert(
                    id,
                    BatchRow {
                        batch: batch.clone(),
                        inserted: seq,
                        written: seq,
                        history: wrap_events(id, 0, events).collect(),
                    },
                );
            }
        }
        Ok(())
    }

    fn get(&self, id: BatchId) -> Result<Option<ByProductBatch>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(inner.rows.get(&id).map(|r| r.batch.clone()))
    }

    fn list(&self, query: &BatchQuery) -> Result<Vec<ByProductBatch>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::poisoned())?;

        let mut rows: Vec<&BatchRow> = inner
            .rows
            .values()
            .filter(|r| query.matches(&r.batch))
            .collect();

        match query.order {
            BatchOrder::CreatedDesc => rows.sort_by(|a, b| {
                b.batch
                    .created_at()
                    .cmp(&a.batch.created_at())
                    .then(b.inserted.cmp(&a.inserted))
            }),
            BatchOrder::UpdatedDesc => rows.sort_by(|a, b| {
                b.batch
                    .updated_at()
                    .cmp(&a.batch.updated_at())
                    .then(b.written.cmp(&a.written))
            }),
        }

        Ok(rows
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|r| r.batch.clone())
            .collect())
    }

    fn find_by_source(
        &self,
        prediction_id: PredictionId,
    ) -> Result<Vec<ByProductBatch>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(inner
            .rows
            .values()
            .filter(|r| r.batch.source_prediction_id() == Some(prediction_id))
            .map(|r| r.batch.clone())
            .collect())
    }

    fn history(&self, id: BatchId) -> Result<Vec<EventEnvelope<BatchEvent>>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(inner
            .rows
            .get(&id)
            .map(|r| r.history.clone())
            .unwrap_or_default())
    }

    fn stats(&self) -> Result<BatchStats, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::poisoned())?;
        let mut stats = BatchStats::default();
        for row in inner.rows.values() {
            stats.total += 1;
            *stats.counts.entry(row.batch.status()).or_insert(0) += 1;
            stats.total_quantity_kg += row.batch.quantity_kg();
        }
        Ok(stats)
    }
}
