use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::input::PredictionInput;
use crate::model::{ModelArtifact, ModelError, RegressionModel};
use crate::result::{EstimationError, PredictionResult};

/// Share of the predicted yield reported as by-product percentage.
///
/// A fixed ratio, not a physical law; deployments override it through
/// configuration.
pub const DEFAULT_BYPRODUCT_RATIO: f64 = 0.52;

/// Round to `places` decimal places.
///
/// Rounds the exact binary value of `value`, so `9.555` (stored just below
/// the decimal) goes down. An exact tie such as `8.125` goes to the even
/// digit. Non-finite values come back unchanged.
pub fn round_to(value: f64, places: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    // Float formatting is correctly rounded with ties to even.
    format!("{value:.places$}").parse().unwrap_or(value)
}

/// By-product percentage derived from a yield: `round(yield × ratio, 2)`.
pub fn derive_byproduct(predicted_yield: f64, ratio: f64) -> f64 {
    round_to(predicted_yield * ratio, 2)
}

/// Yield estimator over a loaded regression model.
///
/// Built once at startup and shared by reference (it is `Clone` and cheap to
/// clone). An estimator without a model answers every request with
/// [`EstimationError::ModelUnavailable`].
#[derive(Debug, Clone)]
pub struct YieldEstimator {
    model: Option<Arc<dyn RegressionModel>>,
    byproduct_ratio: f64,
}

impl YieldEstimator {
    pub fn new(model: Arc<dyn RegressionModel>) -> Self {
        Self {
            model: Some(model),
            byproduct_ratio: DEFAULT_BYPRODUCT_RATIO,
        }
    }

    /// Estimator with no model loaded.
    pub fn unavailable() -> Self {
        Self {
            model: None,
            byproduct_ratio: DEFAULT_BYPRODUCT_RATIO,
        }
    }

    /// Load the artifact at `path`.
    ///
    /// A missing file is not an error: the estimator starts in the
    /// unavailable state so the rest of the process can come up. A file that
    /// exists but cannot be parsed or validated is an error.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            warn!(path = %path.display(), "yield model artifact not found; estimates disabled");
            return Ok(Self::unavailable());
        }

        let model = ModelArtifact::load(path)?.into_model()?;
        info!(path = %path.display(), kind = model.kind(), "yield model loaded");
        Ok(Self::new(model))
    }

    pub fn with_byproduct_ratio(mut self, ratio: f64) -> Self {
        self.byproduct_ratio = ratio;
        self
    }

    pub fn byproduct_ratio(&self) -> f64 {
        self.byproduct_ratio
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    /// Estimate yield and by-product percentage for one run.
    pub fn predict(&self, input: &PredictionInput) -> Result<PredictionResult, EstimationError> {
        let model = self.model.as_ref().ok_or(EstimationError::ModelUnavailable)?;

        let features = input.features();
        let predicted_yield = model
            .predict(&features)
            .map_err(|e| EstimationError::ComputationFailed(e.to_string()))?;

        if !predicted_yield.is_finite() {
            return Err(EstimationError::ComputationFailed(format!(
                "model returned non-finite yield {predicted_yield}"
            )));
        }

        let predicted_byproduct = derive_byproduct(predicted_yield, self.byproduct_ratio);
        if !predicted_byproduct.is_finite() {
            return Err(EstimationError::ComputationFailed(format!(
                "non-finite by-product for yield {predicted_yield}"
            )));
        }

        debug!(
            model = model.kind(),
            predicted_yield,
            predicted_byproduct,
            "yield estimated"
        );

        Ok(PredictionResult::new(predicted_yield, predicted_byproduct))
    }
}
