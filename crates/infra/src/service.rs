//! Production workflow: estimate a run, keep the prediction, record its
//! by-product batch.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use alutrack_ai::{
    EstimationError, ModelError, PredictionInput, PredictionRequest, PredictionResult,
    YieldEstimator,
};
use alutrack_byproducts::ByProductBatch;
use alutrack_core::{Clock, PredictionId};

use crate::config::AppConfig;
use crate::identity::{IdentityDirectory, Role, UserCounts};
use crate::ledger::{ByProductLedger, LedgerError, LedgerSummary};
use crate::store::{
    AgentRef, InMemoryBatchStore, InMemoryPredictionStore, PredictionRecord, PredictionStore,
    StoreError,
};

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Nothing was stored.
    #[error(transparent)]
    Estimation(#[from] EstimationError),

    /// The estimate succeeded but the prediction could not be stored; no
    /// batch was recorded.
    #[error("prediction could not be stored: {source}")]
    Persistence {
        estimate: PredictionResult,
        #[source]
        source: StoreError,
    },

    /// The prediction is stored but its by-product batch was not recorded.
    #[error("by-product batch could not be recorded: {source}")]
    Ledger {
        estimate: PredictionResult,
        #[source]
        source: LedgerError,
    },
}

impl SubmitError {
    /// The estimate, when one was computed before the failure.
    pub fn estimate(&self) -> Option<&PredictionResult> {
        match self {
            SubmitError::Estimation(_) => None,
            SubmitError::Persistence { estimate, .. } | SubmitError::Ledger { estimate, .. } => {
                Some(estimate)
            }
        }
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub prediction: PredictionRecord,
    pub batch: ByProductBatch,
}

/// Administrative overview of users, predictions and by-product totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    /// Approved users only.
    pub users: UserCounts,
    pub total_predictions: usize,
    /// Newest first.
    pub recent: Vec<PredictionRecord>,
    pub byproducts: LedgerSummary,
}

pub struct ProductionService {
    estimator: Arc<YieldEstimator>,
    ledger: Arc<ByProductLedger>,
    predictions: Arc<dyn PredictionStore>,
    directory: Arc<dyn IdentityDirectory>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for ProductionService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProductionService")
            .field("estimator", &self.estimator)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl ProductionService {
    pub fn new(
        estimator: Arc<YieldEstimator>,
        ledger: Arc<ByProductLedger>,
        predictions: Arc<dyn PredictionStore>,
        directory: Arc<dyn IdentityDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            estimator,
            ledger,
            predictions,
            directory,
            clock,
        }
    }

    /// Service over in-memory stores, with the estimator loaded from the
    /// configured artifact.
    pub fn in_memory(
        config: &AppConfig,
        directory: Arc<dyn IdentityDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ModelError> {
        let estimator = YieldEstimator::load(&config.estimator.model_path)?
            .with_byproduct_ratio(config.estimator.byproduct_ratio);
        let ledger = ByProductLedger::from_config(
            Arc::new(InMemoryBatchStore::new()),
            clock.clone(),
            &config.ledger,
        );

        Ok(Self::new(
            Arc::new(estimator),
            Arc::new(ledger),
            Arc::new(InMemoryPredictionStore::new()),
            directory,
            clock,
        ))
    }

    pub fn ledger(&self) -> &ByProductLedger {
        &self.ledger
    }

    pub fn estimator(&self) -> &YieldEstimator {
        &self.estimator
    }

    /// Parse and estimate without storing anything.
    pub fn estimate(
        &self,
        request: &PredictionRequest,
    ) -> Result<(PredictionInput, PredictionResult), EstimationError> {
        let input = PredictionInput::try_from(request.clone())?;
        let result = self.estimator.predict(&input)?;
        Ok((input, result))
    }

    /// Estimate a run, store the prediction and record its by-product batch.
    ///
    /// The submitting agent is the user whose email is exactly
    /// `request.email` and whose role is agent. Without a match the
    /// prediction is still stored, just without an agent.
    pub fn submit(&self, request: PredictionRequest) -> Result<Submission, SubmitError> {
        let (input, result) = self.estimate(&request)?;
        let agent = self.resolve_agent(request.email.as_deref());

        let prediction = PredictionRecord {
            id: PredictionId::new(),
            agent,
            input,
            result,
            created_at: self.clock.now(),
        };
        self.predictions
            .insert(prediction.clone())
            .map_err(|source| SubmitError::Persistence {
                estimate: result,
                source,
            })?;

        let batch = self
            .ledger
            .record(&result, &input, Some(prediction.id))
            .map_err(|source| SubmitError::Ledger {
                estimate: result,
                source,
            })?;

        info!(
            prediction_id = %prediction.id,
            batch_id = %batch.id_typed(),
            predicted_yield = result.predicted_yield(),
            predicted_byproduct = result.predicted_byproduct(),
            agent = prediction.agent.as_ref().map(|a| a.email.as_str()),
            "prediction submitted"
        );

        Ok(Submission { prediction, batch })
    }

    fn resolve_agent(&self, email: Option<&str>) -> Option<AgentRef> {
        let email = email.filter(|e| !e.is_empty())?;
        match self.directory.find_by_email(email, Role::Agent) {
            Ok(Some(identity)) => Some(identity.agent_ref()),
            Ok(None) => {
                warn!(email, "no agent with this email; prediction stored unattributed");
                None
            }
            Err(e) => {
                warn!(email, error = %e, "agent lookup failed; prediction stored unattributed");
                None
            }
        }
    }

    /// Approved user counts, total prediction count, the `limit` most recent
    /// predictions and the by-product summary.
    pub fn overview(&self, limit: usize) -> Result<Overview, LedgerError> {
        Ok(Overview {
            users: self.directory.approved_counts()?,
            total_predictions: self.predictions.count()?,
            recent: self.predictions.list_recent(limit)?,
            byproducts: self.ledger.summary()?,
        })
    }

    pub fn prediction(&self, id: PredictionId) -> Result<Option<PredictionRecord>, LedgerError> {
        Ok(self.predictions.get(id)?)
    }

    /// Delete a prediction. Its batches are kept with the back-link cleared.
    ///
    /// Returns the deleted record, or `None` if there was nothing to delete.
    pub fn delete_prediction(
        &self,
        id: PredictionId,
    ) -> Result<Option<PredictionRecord>, LedgerError> {
        if self.predictions.get(id)?.is_none() {
            debug!(prediction_id = %id, "delete of unknown prediction ignored");
            return Ok(None);
        }

        let detached = self.ledger.detach_source(id)?;
        let deleted = self.predictions.delete(id)?;
        info!(prediction_id = %id, detached, "prediction deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Identity, InMemoryIdentityDirectory};
    use alutrack_ai::LinearModel;
    use alutrack_byproducts::BatchStatus;
    use alutrack_core::{ManualClock, UserId};
    use chrono::Utc;
    use serde_json::json;

    fn service_with(estimator: YieldEstimator) -> (ProductionService, Arc<InMemoryIdentityDirectory>) {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let directory = Arc::new(InMemoryIdentityDirectory::new());
        let ledger = ByProductLedger::new(Arc::new(InMemoryBatchStore::new()), clock.clone());
        let service = ProductionService::new(
            Arc::new(estimator),
            Arc::new(ledger),
            Arc::new(InMemoryPredictionStore::new()),
            directory.clone(),
            clock,
        );
        (service, directory)
    }

    /// Yield of exactly 41.0 regardless of inputs.
    fn constant_estimator() -> YieldEstimator {
        YieldEstimator::new(Arc::new(LinearModel {
            intercept: 41.0,
            coefficients: vec![0.0; 6],
        }))
    }

    fn request(email: Option<&str>) -> PredictionRequest {
        serde_json::from_value(json!({
            "email": email,
            "bauxite_mass": 200,
            "caustic_soda_conc": "45",
            "temperature": 800,
            "pressure": 5,
            "purity": 0.85,
            "reaction_time": 5
        }))
        .unwrap()
    }

    #[test]
    fn submit_links_prediction_and_batch() {
        let (service, directory) = service_with(constant_estimator());
        let agent = Identity {
            id: UserId::new(),
            name: "Amina Yusuf".to_string(),
            email: "amina@plant.example".to_string(),
            role: Role::Agent,
            approved: true,
        };
        directory.insert(agent.clone()).unwrap();

        let submission = service.submit(request(Some("amina@plant.example"))).unwrap();
        assert_eq!(submission.prediction.result.predicted_yield(), 41.0);
        assert_eq!(submission.prediction.result.predicted_byproduct(), 21.32);
        assert_eq!(submission.prediction.agent, Some(agent.agent_ref()));
        assert_eq!(
            submission.batch.source_prediction_id(),
            Some(submission.prediction.id)
        );
        assert_eq!(submission.batch.status(), BatchStatus::Received);
        assert!((submission.batch.quantity_kg() - 42.64).abs() < 1e-9);
    }

    #[test]
    fn unknown_email_still_records_prediction() {
        let (service, _) = service_with(constant_estimator());
        let submission = service.submit(request(Some("nobody@plant.example"))).unwrap();
        assert_eq!(submission.prediction.agent, None);

        let submission = service.submit(request(None)).unwrap();
        assert_eq!(submission.prediction.agent, None);
        assert_eq!(service.overview(10).unwrap().total_predictions, 2);
    }

    #[test]
    fn invalid_input_stores_nothing() {
        let (service, _) = service_with(constant_estimator());
        let mut bad = request(None);
        bad.temperature = Some(json!("hot"));

        let err = service.submit(bad).unwrap_err();
        assert!(matches!(err, SubmitError::Estimation(EstimationError::InvalidInput(_))));
        assert!(err.estimate().is_none());

        let overview = service.overview(10).unwrap();
        assert_eq!(overview.total_predictions, 0);
        assert_eq!(overview.byproducts.total_batches, 0);
    }

    #[test]
    fn negative_estimate_keeps_prediction_and_reports_ledger_failure() {
        let (service, _) = service_with(YieldEstimator::new(Arc::new(LinearModel {
            intercept: -10.0,
            coefficients: vec![0.0; 6],
        })));

        let err = service.submit(request(None)).unwrap_err();
        match &err {
            SubmitError::Ledger { estimate, source } => {
                assert_eq!(estimate.predicted_yield(), -10.0);
                assert!(matches!(source, LedgerError::InvalidBatch(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.estimate().map(|e| e.predicted_byproduct()), Some(-5.2));
        assert_eq!(service.overview(10).unwrap().total_predictions, 1);
        assert_eq!(service.ledger().summary().unwrap().total_batches, 0);
    }

    #[test]
    fn delete_prediction_detaches_batch() {
        let (service, _) = service_with(constant_estimator());
        let submission = service.submit(request(None)).unwrap();
        let id = submission.prediction.id;

        let deleted = service.delete_prediction(id).unwrap();
        assert_eq!(deleted.map(|r| r.id), Some(id));
        assert_eq!(service.prediction(id).unwrap(), None);
        assert_eq!(service.delete_prediction(id).unwrap(), None);

        let batch = service.ledger().get(submission.batch.id_typed()).unwrap();
        assert_eq!(batch.source_prediction_id(), None);
    }

    #[test]
    fn overview_limits_recent_list() {
        let (service, _) = service_with(constant_estimator());
        for _ in 0..3 {
            service.submit(request(None)).unwrap();
        }

        let overview = service.overview(2).unwrap();
        assert_eq!(overview.total_predictions, 3);
        assert_eq!(overview.recent.len(), 2);
        assert_eq!(overview.byproducts.total_batches, 3);
        assert_eq!(overview.byproducts.counts[&BatchStatus::Received], 3);
    }

    #[test]
    fn overview_counts_approved_users_by_role() {
        let (service, directory) = service_with(constant_estimator());
        assert_eq!(service.overview(5).unwrap().users, UserCounts::default());

        for (email, role, approved) in [
            ("amina@plant.example", Role::Agent, true),
            ("pending@plant.example", Role::Agent, false),
            ("ops@plant.example", Role::ScrapTeam, true),
            ("boss@plant.example", Role::Admin, true),
        ] {
            directory
                .insert(Identity {
                    id: UserId::new(),
                    name: email.to_string(),
                    email: email.to_string(),
                    role,
                    approved,
                })
                .unwrap();
        }

        let users = service.overview(5).unwrap().users;
        assert_eq!(users.total, 3);
        assert_eq!(users.by_role[&Role::Agent], 1);
        assert_eq!(users.by_role[&Role::ScrapTeam], 1);
        assert_eq!(users.by_role[&Role::Admin], 1);

        let value = serde_json::to_value(service.overview(5).unwrap()).unwrap();
        assert_eq!(value["users"]["by_role"]["scrap_team"], json!(1));
    }

    #[test]
    fn agent_lookup_uses_the_email_as_given() {
        let (service, directory) = service_with(constant_estimator());
        directory
            .insert(Identity {
                id: UserId::new(),
                name: "Amina Yusuf".to_string(),
                email: "amina@plant.example".to_string(),
                role: Role::Agent,
                approved: false,
            })
            .unwrap();

        let padded = service.submit(request(Some(" amina@plant.example "))).unwrap();
        assert_eq!(padded.prediction.agent, None);

        let exact = service.submit(request(Some("amina@plant.example"))).unwrap();
        assert_eq!(exact.prediction.agent.map(|a| a.email), Some("amina@plant.example".to_string()));
    }

    #[test]
    fn in_memory_without_artifact_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.estimator.model_path = dir.path().join("missing.json");

        let service = ProductionService::in_memory(
            &config,
            Arc::new(InMemoryIdentityDirectory::new()),
            Arc::new(ManualClock::new(Utc::now())),
        )
        .unwrap();
        assert!(!service.estimator().is_available());

        let err = service.submit(request(None)).unwrap_err();
        assert!(matches!(err, SubmitError::Estimation(EstimationError::ModelUnavailable)));
        assert_eq!(service.ledger().summary().unwrap().total_batches, 0);
    }
}
