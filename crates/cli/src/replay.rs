//! Replay a recorded day of plant runs through an in-memory ledger.
//!
//! Script format:
//!
//! ```json
//! {
//!   "predictions": [{ "bauxite_mass": 200, "caustic_soda_conc": 45, ... }],
//!   "transitions": [{ "prediction": 0, "status": "in_process" }]
//! }
//! ```
//!
//! `transitions[].prediction` indexes into `predictions`.

use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use alutrack_ai::PredictionRequest;
use alutrack_byproducts::BatchStatus;
use alutrack_core::BatchId;
use alutrack_infra::{Overview, ProductionService};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub predictions: Vec<PredictionRequest>,
    #[serde(default)]
    pub transitions: Vec<ReplayTransition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayTransition {
    pub prediction: usize,
    pub status: BatchStatus,
}

impl ReplayScript {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading replay script {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing replay script {}", path.display()))
    }
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub submitted: usize,
    pub failed: usize,
    pub transitioned: usize,
    pub overview: Overview,
}

pub fn run(
    service: &ProductionService,
    script: ReplayScript,
    recent: usize,
) -> anyhow::Result<ReplayReport> {
    let mut batches: Vec<Option<BatchId>> = Vec::with_capacity(script.predictions.len());
    let mut failed = 0;

    for (index, request) in script.predictions.into_iter().enumerate() {
        match service.submit(request) {
            Ok(submission) => batches.push(Some(submission.batch.id_typed())),
            Err(e) => {
                warn!(index, error = %e, "prediction rejected");
                failed += 1;
                batches.push(None);
            }
        }
    }

    let mut transitioned = 0;
    for step in script.transitions {
        let Some(slot) = batches.get(step.prediction) else {
            bail!(
                "transition refers to prediction {} but the script has {}",
                step.prediction,
                batches.len()
            );
        };
        let Some(batch_id) = slot else {
            warn!(index = step.prediction, "skipping transition of rejected prediction");
            continue;
        };
        service
            .ledger()
            .transition_status(*batch_id, step.status)
            .with_context(|| format!("moving batch {batch_id} to {}", step.status))?;
        transitioned += 1;
    }

    Ok(ReplayReport {
        submitted: batches.len() - failed,
        failed,
        transitioned,
        overview: service.overview(recent)?,
    })
}
