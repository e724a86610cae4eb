use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use alutrack_core::{Aggregate, AggregateRoot, BatchId, DomainError, PredictionId, UserId};
use alutrack_events::Event;

use crate::quantity::derive_quantity_kg;
use crate::status::{BatchStatus, TransitionPolicy};

/// Material name given to batches unless the caller supplies one.
pub const DEFAULT_MATERIAL_NAME: &str = "Red Mud";

/// Person a batch is handed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    /// Directory identity, when the assignee is a registered user.
    pub user_id: Option<UserId>,
    pub name: String,
    pub email: Option<String>,
}

/// Aggregate root: ByProductBatch.
///
/// One batch is recorded per prediction. After that it only changes through
/// status transitions, assignment, or losing its link to a deleted source
/// prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ByProductBatch {
    id: BatchId,
    name: String,
    quantity_kg: f64,
    percent_of_total: f64,
    status: BatchStatus,
    source_prediction_id: Option<PredictionId>,
    assignee: Option<Assignee>,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl ByProductBatch {
    /// Not-yet-recorded instance, the starting point for `RecordBatch`.
    pub fn empty(id: BatchId) -> Self {
        Self {
            id,
            name: String::new(),
            quantity_kg: 0.0,
            percent_of_total: 0.0,
            status: BatchStatus::Received,
            source_prediction_id: None,
            assignee: None,
            remarks: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BatchId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity_kg(&self) -> f64 {
        self.quantity_kg
    }

    pub fn percent_of_total(&self) -> f64 {
        self.percent_of_total
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn source_prediction_id(&self) -> Option<PredictionId> {
        self.source_prediction_id
    }

    pub fn assignee(&self) -> Option<&Assignee> {
        self.assignee.as_ref()
    }

    pub fn remarks(&self) -> Option<&str> {
        self.remarks.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_recorded(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for ByProductBatch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordBatch.
///
/// Quantity is derived here from the by-product percentage and input mass,
/// never supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub batch_id: BatchId,
    pub name: String,
    pub percent_of_total: f64,
    pub bauxite_mass: f64,
    pub source_prediction_id: Option<PredictionId>,
    pub remarks: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransitionStatus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionStatus {
    pub batch_id: BatchId,
    pub to: BatchStatus,
    pub policy: TransitionPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignBatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignBatch {
    pub batch_id: BatchId,
    pub assignee: Assignee,
    pub remarks: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DetachSource (the source prediction was deleted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetachSource {
    pub batch_id: BatchId,
    pub prediction_id: PredictionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BatchCommand {
    Record(RecordBatch),
    TransitionStatus(TransitionStatus),
    Assign(AssignBatch),
    DetachSource(DetachSource),
}

/// Event: BatchRecorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecorded {
    pub batch_id: BatchId,
    pub name: String,
    pub quantity_kg: f64,
    pub percent_of_total: f64,
    pub source_prediction_id: Option<PredictionId>,
    pub remarks: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub batch_id: BatchId,
    pub from: BatchStatus,
    pub to: BatchStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchAssigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAssigned {
    pub batch_id: BatchId,
    pub assignee: Assignee,
    pub remarks: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SourceDetached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDetached {
    pub batch_id: BatchId,
    pub prediction_id: PredictionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    Recorded(BatchRecorded),
    StatusChanged(StatusChanged),
    Assigned(BatchAssigned),
    SourceDetached(SourceDetached),
}

impl Event for BatchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BatchEvent::Recorded(_) => "byproduct.batch.recorded",
            BatchEvent::StatusChanged(_) => "byproduct.batch.status_changed",
            BatchEvent::Assigned(_) => "byproduct.batch.assigned",
            BatchEvent::SourceDetached(_) => "byproduct.batch.source_detached",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BatchEvent::Recorded(e) => e.occurred_at,
            BatchEvent::StatusChanged(e) => e.occurred_at,
            BatchEvent::Assigned(e) => e.occurred_at,
            BatchEvent::SourceDetached(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ByProductBatch {
    type Command = BatchCommand;
    type Event = BatchEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BatchEvent::Recorded(e) => {
                self.id = e.batch_id;
                self.name = e.name.clone();
                self.quantity_kg = e.quantity_kg;
                self.percent_of_total = e.percent_of_total;
                self.status = BatchStatus::Received;
                self.source_prediction_id = e.source_prediction_id;
                self.assignee = None;
                self.remarks = e.remarks.clone();
                self.created_at = e.occurred_at;
                self.updated_at = e.occurred_at;
                self.created = true;
            }
            BatchEvent::StatusChanged(e) => {
                self.status = e.to;
                self.touch(e.occurred_at);
            }
            BatchEvent::Assigned(e) => {
                self.assignee = Some(e.assignee.clone());
                if e.remarks.is_some() {
                    self.remarks = e.remarks.clone();
                }
                self.touch(e.occurred_at);
            }
            BatchEvent::SourceDetached(_) => {
                // Back-link cleanup only; not a lifecycle change, so updated_at stays.
                self.source_prediction_id = None;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BatchCommand::Record(cmd) => self.handle_record(cmd),
            BatchCommand::TransitionStatus(cmd) => self.handle_transition(cmd),
            BatchCommand::Assign(cmd) => self.handle_assign(cmd),
            BatchCommand::DetachSource(cmd) => self.handle_detach(cmd),
        }
    }
}

impl ByProductBatch {
    /// `updated_at` never moves backwards, even if the clock does.
    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(at);
    }

    fn ensure_recorded(&self, batch_id: BatchId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != batch_id {
            return Err(DomainError::invariant("batch_id mismatch"));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordBatch) -> Result<Vec<BatchEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("batch already recorded"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if !cmd.percent_of_total.is_finite() {
            return Err(DomainError::validation("percent_of_total must be finite"));
        }
        if !(cmd.bauxite_mass.is_finite() && cmd.bauxite_mass >= 0.0) {
            return Err(DomainError::validation(
                "bauxite_mass must be finite and non-negative",
            ));
        }

        let quantity_kg = derive_quantity_kg(cmd.percent_of_total, cmd.bauxite_mass);
        if quantity_kg < 0.0 {
            return Err(DomainError::validation(format!(
                "derived quantity {quantity_kg} kg is negative"
            )));
        }

        Ok(vec![BatchEvent::Recorded(BatchRecorded {
            batch_id: cmd.batch_id,
            name: cmd.name.trim().to_string(),
            quantity_kg,
            percent_of_total: cmd.percent_of_total,
            source_prediction_id: cmd.source_prediction_id,
            remarks: cmd.remarks.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transition(&self, cmd: &TransitionStatus) -> Result<Vec<BatchEvent>, DomainError> {
        self.ensure_recorded(cmd.batch_id)?;

        if !cmd.policy.allows(self.status, cmd.to) {
            return Err(DomainError::invariant(format!(
                "transition {} -> {} not allowed",
                self.status, cmd.to
            )));
        }

        Ok(vec![BatchEvent::StatusChanged(StatusChanged {
            batch_id: cmd.batch_id,
            from: self.status,
            to: cmd.to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign(&self, cmd: &AssignBatch) -> Result<Vec<BatchEvent>, DomainError> {
        self.ensure_recorded(cmd.batch_id)?;

        if cmd.assignee.name.trim().is_empty() {
            return Err(DomainError::validation("assignee name cannot be empty"));
        }

        Ok(vec![BatchEvent::Assigned(BatchAssigned {
            batch_id: cmd.batch_id,
            assignee: cmd.assignee.clone(),
            remarks: cmd.remarks.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_detach(&self, cmd: &DetachSource) -> Result<Vec<BatchEvent>, DomainError> {
        self.ensure_recorded(cmd.batch_id)?;

        if self.source_prediction_id != Some(cmd.prediction_id) {
            return Ok(vec![]);
        }

        Ok(vec![BatchEvent::SourceDetached(SourceDetached {
            batch_id: cmd.batch_id,
            prediction_id: cmd.prediction_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc::now()
    }

    fn record_cmd(batch_id: BatchId, pct: f64, mass: f64, at: DateTime<Utc>) -> RecordBatch {
        RecordBatch {
            batch_id,
            name: DEFAULT_MATERIAL_NAME.to_string(),
            percent_of_total: pct,
            bauxite_mass: mass,
            source_prediction_id: Some(PredictionId::new()),
            remarks: Some("auto".to_string()),
            occurred_at: at,
        }
    }

    fn recorded(pct: f64, mass: f64, at: DateTime<Utc>) -> ByProductBatch {
        let id = BatchId::new();
        let mut batch = ByProductBatch::empty(id);
        let events = batch
            .handle(&BatchCommand::Record(record_cmd(id, pct, mass, at)))
            .unwrap();
        for e in &events {
            batch.apply(e);
        }
        batch
    }

    fn run(batch: &mut ByProductBatch, cmd: BatchCommand) -> Result<(), DomainError> {
        let events = batch.handle(&cmd)?;
        for e in &events {
            batch.apply(e);
        }
        Ok(())
    }

    #[test]
    fn record_starts_received_with_equal_timestamps() {
        let at = t0();
        let batch = recorded(21.44, 200.0, at);

        assert!(batch.is_recorded());
        assert_eq!(batch.status(), BatchStatus::Received);
        assert_eq!(batch.name(), DEFAULT_MATERIAL_NAME);
        assert_eq!(batch.percent_of_total(), 21.44);
        assert_eq!(batch.quantity_kg(), (21.44 / 100.0) * 200.0);
        assert_eq!(batch.created_at(), at);
        assert_eq!(batch.updated_at(), at);
        assert!(batch.assignee().is_none());
        assert_eq!(batch.version(), 1);
    }

    #[test]
    fn record_with_zero_mass_keeps_percentage_as_quantity() {
        let batch = recorded(21.44, 0.0, t0());
        assert_eq!(batch.quantity_kg(), 21.44);
    }

    #[test]
    fn record_twice_is_a_conflict() {
        let at = t0();
        let batch = recorded(10.0, 10.0, at);
        let err = batch
            .handle(&BatchCommand::Record(record_cmd(batch.id_typed(), 10.0, 10.0, at)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn record_rejects_negative_quantity() {
        let id = BatchId::new();
        let err = ByProductBatch::empty(id)
            .handle(&BatchCommand::Record(record_cmd(id, -3.0, 100.0, t0())))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn transition_updates_status_and_timestamp_only() {
        let at = t0();
        let mut batch = recorded(10.0, 50.0, at);
        let before = batch.clone();
        let later = at + TimeDelta::seconds(30);
        let batch_id = batch.id_typed();

        run(
            &mut batch,
            BatchCommand::TransitionStatus(TransitionStatus {
                batch_id,
                to: BatchStatus::InProcess,
                policy: TransitionPolicy::Unrestricted,
                occurred_at: later,
            }),
        )
        .unwrap();

        assert_eq!(batch.status(), BatchStatus::InProcess);
        assert_eq!(batch.updated_at(), later);
        assert_eq!(batch.created_at(), before.created_at());
        assert_eq!(batch.quantity_kg(), before.quantity_kg());
        assert_eq!(batch.remarks(), before.remarks());
        assert_eq!(batch.version(), 2);
    }

    #[test]
    fn unrestricted_policy_allows_used_back_to_received() {
        let at = t0();
        let mut batch = recorded(10.0, 50.0, at);
        let id = batch.id_typed();
        for to in [BatchStatus::Used, BatchStatus::Received] {
            run(
                &mut batch,
                BatchCommand::TransitionStatus(TransitionStatus {
                    batch_id: id,
                    to,
                    policy: TransitionPolicy::Unrestricted,
                    occurred_at: at,
                }),
            )
            .unwrap();
        }
        assert_eq!(batch.status(), BatchStatus::Received);
    }

    #[test]
    fn forward_only_policy_rejects_going_back() {
        let at = t0();
        let mut batch = recorded(10.0, 50.0, at);
        let id = batch.id_typed();
        run(
            &mut batch,
            BatchCommand::TransitionStatus(TransitionStatus {
                batch_id: id,
                to: BatchStatus::Used,
                policy: TransitionPolicy::ForwardOnly,
                occurred_at: at,
            }),
        )
        .unwrap();

        let err = batch
            .handle(&BatchCommand::TransitionStatus(TransitionStatus {
                batch_id: id,
                to: BatchStatus::Received,
                policy: TransitionPolicy::ForwardOnly,
                occurred_at: at,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn transition_on_unrecorded_batch_is_not_found() {
        let id = BatchId::new();
        let err = ByProductBatch::empty(id)
            .handle(&BatchCommand::TransitionStatus(TransitionStatus {
                batch_id: id,
                to: BatchStatus::InProcess,
                policy: TransitionPolicy::Unrestricted,
                occurred_at: t0(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn updated_at_never_moves_backwards() {
        let at = t0();
        let mut batch = recorded(10.0, 50.0, at);
        let id = batch.id_typed();
        run(
            &mut batch,
            BatchCommand::TransitionStatus(TransitionStatus {
                batch_id: id,
                to: BatchStatus::InProcess,
                policy: TransitionPolicy::Unrestricted,
                occurred_at: at - TimeDelta::seconds(10),
            }),
        )
        .unwrap();
        assert_eq!(batch.updated_at(), at);
    }

    #[test]
    fn assign_keeps_status_and_replaces_remarks_when_given() {
        let at = t0();
        let mut batch = recorded(10.0, 50.0, at);
        let id = batch.id_typed();
        let assignee = Assignee {
            user_id: Some(UserId::new()),
            name: "Scrap Team Lead".to_string(),
            email: Some("lead@example.com".to_string()),
        };

        run(
            &mut batch,
            BatchCommand::Assign(AssignBatch {
                batch_id: id,
                assignee: assignee.clone(),
                remarks: None,
                occurred_at: at + TimeDelta::seconds(1),
            }),
        )
        .unwrap();
        assert_eq!(batch.assignee(), Some(&assignee));
        assert_eq!(batch.remarks(), Some("auto"));
        assert_eq!(batch.status(), BatchStatus::Received);

        run(
            &mut batch,
            BatchCommand::Assign(AssignBatch {
                batch_id: id,
                assignee,
                remarks: Some("kiln 2".to_string()),
                occurred_at: at + TimeDelta::seconds(2),
            }),
        )
        .unwrap();
        assert_eq!(batch.remarks(), Some("kiln 2"));
        assert_eq!(batch.updated_at(), at + TimeDelta::seconds(2));
    }

    #[test]
    fn assign_rejects_blank_name() {
        let batch = recorded(10.0, 50.0, t0());
        let err = batch
            .handle(&BatchCommand::Assign(AssignBatch {
                batch_id: batch.id_typed(),
                assignee: Assignee {
                    user_id: None,
                    name: "  ".to_string(),
                    email: None,
                },
                remarks: None,
                occurred_at: t0(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn detach_clears_matching_source_without_touching_updated_at() {
        let at = t0();
        let mut batch = recorded(10.0, 50.0, at);
        let id = batch.id_typed();
        let source = batch.source_prediction_id().unwrap();

        // A different prediction id is a no-op.
        let events = batch
            .handle(&BatchCommand::DetachSource(DetachSource {
                batch_id: id,
                prediction_id: PredictionId::new(),
                occurred_at: at,
            }))
            .unwrap();
        assert!(events.is_empty());

        run(
            &mut batch,
            BatchCommand::DetachSource(DetachSource {
                batch_id: id,
                prediction_id: source,
                occurred_at: at + TimeDelta::minutes(5),
            }),
        )
        .unwrap();
        assert_eq!(batch.source_prediction_id(), None);
        assert_eq!(batch.updated_at(), at);
    }

    #[test]
    fn serialized_batch_uses_canonical_field_names() {
        let batch = recorded(10.0, 50.0, t0());
        let json = serde_json::to_value(&batch).unwrap();
        for key in [
            "quantity_kg",
            "percent_of_total",
            "status",
            "created_at",
            "updated_at",
            "source_prediction_id",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["status"], "received");
        assert!(json.get("created").is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: a freshly recorded batch is always `received`, whatever the figures.
        #[test]
        fn record_always_yields_received(
            pct in 0.0f64..100.0,
            mass in prop_oneof![Just(0.0f64), 0.001f64..10_000.0],
        ) {
            let batch = recorded(pct, mass, t0());
            prop_assert_eq!(batch.status(), BatchStatus::Received);
            prop_assert_eq!(batch.quantity_kg(), derive_quantity_kg(pct, mass));
        }
    }
}
