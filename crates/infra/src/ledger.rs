//! By-product ledger: records one batch per prediction and tracks it through
//! its processing lifecycle.
//!
//! Every write follows the same pipeline:
//!
//! ```text
//! load current batch (or start from `ByProductBatch::empty`)
//!   ↓
//! handle command (pure, produces events)
//!   ↓
//! apply events to a copy
//!   ↓
//! save copy + events with a version check
//! ```
//!
//! so a batch and its history never diverge, and a write made against a
//! stale copy fails with [`LedgerError::Conflict`] instead of being lost.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use alutrack_ai::{PredictionInput, PredictionResult};
use alutrack_byproducts::{
    AssignBatch, Assignee, BatchCommand, BatchEvent, BatchStatus, ByProductBatch, DetachSource,
    RecordBatch, TransitionPolicy, TransitionStatus,
};
use alutrack_core::{
    Aggregate, AggregateRoot, BatchId, Clock, DomainError, ExpectedVersion, PredictionId,
};
use alutrack_events::EventEnvelope;

use crate::config::LedgerConfig;
use crate::store::{BatchOrder, BatchQuery, BatchStore, StoreError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("by-product batch {0} not found")]
    NotFound(BatchId),
    /// The configured transition policy rejected the status change.
    #[error("invalid status transition: {0}")]
    InvalidTransition(String),
    /// Record or assignment input failed validation.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Storage(StoreError),
}

impl LedgerError {
    fn from_domain(batch_id: BatchId, err: DomainError) -> Self {
        match err {
            DomainError::NotFound => LedgerError::NotFound(batch_id),
            DomainError::InvariantViolation(msg) => LedgerError::InvalidTransition(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                LedgerError::InvalidBatch(msg)
            }
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) | StoreError::AlreadyExists(msg) => {
                LedgerError::Conflict(msg)
            }
            other => LedgerError::Storage(other),
        }
    }
}

/// Totals across the whole ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub total_batches: usize,
    pub total_quantity_kg: f64,
    /// Holds every status, zero when no batch has it.
    pub counts: BTreeMap<BatchStatus, usize>,
}

pub struct ByProductLedger {
    store: Arc<dyn BatchStore>,
    clock: Arc<dyn Clock>,
    material_name: String,
    policy: TransitionPolicy,
}

impl core::fmt::Debug for ByProductLedger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ByProductLedger")
            .field("material_name", &self.material_name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ByProductLedger {
    pub fn new(store: Arc<dyn BatchStore>, clock: Arc<dyn Clock>) -> Self {
        let defaults = LedgerConfig::default();
        Self {
            store,
            clock,
            material_name: defaults.material_name,
            policy: defaults.transition_policy,
        }
    }

    pub fn from_config(
        store: Arc<dyn BatchStore>,
        clock: Arc<dyn Clock>,
        config: &LedgerConfig,
    ) -> Self {
        Self::new(store, clock)
            .with_material_name(config.material_name.clone())
            .with_policy(config.transition_policy)
    }

    pub fn with_material_name(mut self, name: impl Into<String>) -> Self {
        self.material_name = name.into();
        self
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn material_name(&self) -> &str {
        &self.material_name
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Record the by-product of one estimate as a new `received` batch.
    ///
    /// Quantity is `predicted_byproduct`% of the input bauxite mass, or the
    /// percentage itself when the mass is zero.
    pub fn record(
        &self,
        estimate: &PredictionResult,
        input: &PredictionInput,
        source: Option<PredictionId>,
    ) -> Result<ByProductBatch, LedgerError> {
        self.record_named(self.material_name.clone(), estimate, input, source)
    }

    /// [`record`](Self::record) with an explicit material name.
    pub fn record_named(
        &self,
        name: impl Into<String>,
        estimate: &PredictionResult,
        input: &PredictionInput,
        source: Option<PredictionId>,
    ) -> Result<ByProductBatch, LedgerError> {
        let batch_id = BatchId::new();
        let remarks = match source {
            Some(id) => format!("Auto-generated from prediction {id}"),
            None => "Auto-generated from prediction".to_string(),
        };

        let command = BatchCommand::Record(RecordBatch {
            batch_id,
            name: name.into(),
            percent_of_total: estimate.predicted_byproduct(),
            bauxite_mass: input.bauxite_mass(),
            source_prediction_id: source,
            remarks: Some(remarks),
            occurred_at: self.clock.now(),
        });

        let batch = self.commit(ByProductBatch::empty(batch_id), ExpectedVersion::New, &command)?;

        info!(
            batch_id = %batch.id_typed(),
            quantity_kg = batch.quantity_kg(),
            percent_of_total = batch.percent_of_total(),
            source_prediction_id = ?source,
            "by-product batch recorded"
        );
        Ok(batch)
    }

    /// Move a batch to `status`, subject to the configured policy.
    pub fn transition_status(
        &self,
        batch_id: BatchId,
        status: BatchStatus,
    ) -> Result<ByProductBatch, LedgerError> {
        let policy = self.policy;
        let (before, after) = self.execute(batch_id, |current, at| {
            (
                current.status(),
                BatchCommand::TransitionStatus(TransitionStatus {
                    batch_id,
                    to: status,
                    policy,
                    occurred_at: at,
                }),
            )
        })?;

        info!(
            batch_id = %batch_id,
            from = %before,
            to = %after.status(),
            "by-product batch status changed"
        );
        Ok(after)
    }

    /// Hand a batch to someone. Status is unchanged; `remarks` replaces the
    /// current remarks only when given.
    pub fn assign(
        &self,
        batch_id: BatchId,
        assignee: Assignee,
        remarks: Option<String>,
    ) -> Result<ByProductBatch, LedgerError> {
        let name = assignee.name.clone();
        let (_, batch) = self.execute(batch_id, |_, at| {
            (
                (),
                BatchCommand::Assign(AssignBatch {
                    batch_id,
                    assignee,
                    remarks,
                    occurred_at: at,
                }),
            )
        })?;

        info!(batch_id = %batch_id, assignee = %name, "by-product batch assigned");
        Ok(batch)
    }

    /// Drop the back-link of every batch recorded from `prediction_id`.
    ///
    /// Called before the prediction itself is deleted. Batches and their
    /// history stay; `updated_at` is left alone. Returns how many batches
    /// were detached.
    pub fn detach_source(&self, prediction_id: PredictionId) -> Result<usize, LedgerError> {
        let linked = self.store.find_by_source(prediction_id)?;
        let mut detached = 0;

        for batch in linked {
            let batch_id = batch.id_typed();
            let (_, after) = self.execute(batch_id, |_, at| {
                (
                    (),
                    BatchCommand::DetachSource(DetachSource {
                        batch_id,
                        prediction_id,
                        occurred_at: at,
                    }),
                )
            })?;
            if after.source_prediction_id().is_none() {
                detached += 1;
            }
        }

        if detached > 0 {
            info!(prediction_id = %prediction_id, detached, "by-product batches detached from prediction");
        }
        Ok(detached)
    }

    pub fn get(&self, batch_id: BatchId) -> Result<ByProductBatch, LedgerError> {
        self.store
            .get(batch_id)?
            .ok_or(LedgerError::NotFound(batch_id))
    }

    /// Batches with `status` (all when `None`), newest first.
    pub fn list_by_status(
        &self,
        status: Option<BatchStatus>,
    ) -> Result<Vec<ByProductBatch>, LedgerError> {
        Ok(self.store.list(&BatchQuery::by_status(status))?)
    }

    /// Most recently recorded batch.
    pub fn latest(&self) -> Result<Option<ByProductBatch>, LedgerError> {
        let query = BatchQuery::all().order_by(BatchOrder::CreatedDesc).limit(1);
        Ok(self.store.list(&query)?.into_iter().next())
    }

    /// Most recently updated batch that is `in_process` or `used`.
    pub fn latest_processed(&self) -> Result<Option<ByProductBatch>, LedgerError> {
        Ok(self
            .store
            .list(&BatchQuery::processed().limit(1))?
            .into_iter()
            .next())
    }

    pub fn summary(&self) -> Result<LedgerSummary, LedgerError> {
        let stats = self.store.stats()?;
        Ok(LedgerSummary {
            total_batches: stats.total,
            total_quantity_kg: stats.total_quantity_kg,
            counts: stats.counts,
        })
    }

    /// Lifecycle events of a batch, oldest first.
    pub fn history(&self, batch_id: BatchId) -> Result<Vec<EventEnvelope<BatchEvent>>, LedgerError> {
        let history = self.store.history(batch_id)?;
        if history.is_empty() {
            return Err(LedgerError::NotFound(batch_id));
        }
        Ok(history)
    }

    /// Load, decide and save one command against an existing batch.
    ///
    /// `build` sees the current state and the command timestamp and returns
    /// the command plus anything it wants to carry out of the closure.
    fn execute<T>(
        &self,
        batch_id: BatchId,
        build: impl FnOnce(&ByProductBatch, DateTime<Utc>) -> (T, BatchCommand),
    ) -> Result<(T, ByProductBatch), LedgerError> {
        let current = self.get(batch_id)?;
        let expected = ExpectedVersion::Exact(current.version());
        let (carry, command) = build(&current, self.clock.now());
        let batch = self.commit(current, expected, &command)?;
        Ok((carry, batch))
    }

    fn commit(
        &self,
        mut batch: ByProductBatch,
        expected: ExpectedVersion,
        command: &BatchCommand,
    ) -> Result<ByProductBatch, LedgerError> {
        let batch_id = batch.id_typed();
        let events = batch
            .handle(command)
            .map_err(|e| LedgerError::from_domain(batch_id, e))?;

        for event in &events {
            batch.apply(event);
        }

        self.store.save(&batch, &events, expected)?;
        Ok(batch)
    }
}
