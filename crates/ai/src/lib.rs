//! `alutrack-ai`
//!
//! **Responsibility:** yield estimation boundary.
//!
//! - Parses loosely-typed prediction requests into validated inputs.
//! - Loads regression model artifacts once, at startup.
//! - Turns six process parameters into a yield and a derived by-product
//!   percentage. Pure: never touches storage.

pub mod estimator;
pub mod input;
pub mod model;
pub mod result;

pub use estimator::{DEFAULT_BYPRODUCT_RATIO, YieldEstimator, derive_byproduct, round_to};
pub use input::{DEFAULT_REACTION_TIME, PredictionInput, PredictionRequest};
pub use model::{
    FEATURE_COUNT, FeatureVector, ForestModel, LinearModel, ModelArtifact, ModelError,
    RegressionModel, RegressionTree, TreeNode,
};
pub use result::{EstimationError, PredictionResult};
