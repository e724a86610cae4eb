use serde::{Deserialize, Serialize};
use thiserror::Error;

use alutrack_core::ValueObject;

/// Output of a yield estimate.
///
/// `predicted_byproduct` is a percentage of the input mass, not a mass.
/// Both figures are always present together; failures are reported through
/// [`EstimationError`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    predicted_yield: f64,
    predicted_byproduct: f64,
}

impl PredictionResult {
    pub fn new(predicted_yield: f64, predicted_byproduct: f64) -> Self {
        Self {
            predicted_yield,
            predicted_byproduct,
        }
    }

    pub fn predicted_yield(&self) -> f64 {
        self.predicted_yield
    }

    pub fn predicted_byproduct(&self) -> f64 {
        self.predicted_byproduct
    }
}

impl ValueObject for PredictionResult {}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    /// A parameter was missing, non-numeric, non-finite or negative.
    #[error("invalid prediction input: {0}")]
    InvalidInput(String),

    /// No regression model is loaded. Persists until the artifact is fixed
    /// and the process restarted.
    #[error("yield model unavailable; train and deploy the model artifact first")]
    ModelUnavailable,

    #[error("yield computation failed: {0}")]
    ComputationFailed(String),
}
