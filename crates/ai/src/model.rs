//! Regression model artifacts.
//!
//! The model is trained offline and shipped as a JSON artifact. Two shapes
//! are understood:
//!
//! ```text
//! {"kind": "linear", "intercept": -35.0, "coefficients": [0.02, 0.3, 0.05, -0.2, 5.0, 0.0]}
//! {"kind": "forest", "trees": [{"nodes": [{"feature": 2, "threshold": 800.0, "left": 1, "right": 2},
//!                                         {"value": 20.5}, {"value": 27.1}]}]}
//! ```
//!
//! Tree nodes use the usual layout of exported decision trees: node 0 is the
//! root, a split sends `x[feature] <= threshold` to `left`, everything else to
//! `right`, and children always come after their parent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of process parameters the model consumes.
pub const FEATURE_COUNT: usize = 6;

pub type FeatureVector = [f64; FEATURE_COUNT];

/// A fitted regression function `f(features) -> yield`.
///
/// Implementations are immutable after loading and shared across threads.
pub trait RegressionModel: Send + Sync + core::fmt::Debug {
    /// Short model family name for logs.
    fn kind(&self) -> &'static str;

    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError>;
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model artifact: {0}")]
    Invalid(String),

    #[error("model evaluation failed: {0}")]
    Evaluation(String),
}

/// Deserialized model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModel),
    Forest(ForestModel),
}

impl ModelArtifact {
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let artifact: Self = serde_json::from_str(json)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            ModelArtifact::Linear(m) => m.validate(),
            ModelArtifact::Forest(m) => m.validate(),
        }
    }

    /// Validate and turn the artifact into a shareable model.
    pub fn into_model(self) -> Result<Arc<dyn RegressionModel>, ModelError> {
        self.validate()?;
        Ok(match self {
            ModelArtifact::Linear(m) => Arc::new(m),
            ModelArtifact::Forest(m) => Arc::new(m),
        })
    }
}

/// `intercept + Σ coefficients[i] * x[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    fn validate(&self) -> Result<(), ModelError> {
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(ModelError::Invalid(format!(
                "linear model needs {FEATURE_COUNT} coefficients, found {}",
                self.coefficients.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::Invalid(
                "linear model parameters must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

impl RegressionModel for LinearModel {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(ModelError::Evaluation(
                "coefficient count does not match feature count".to_string(),
            ));
        }
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.iter())
                .map(|(c, x)| c * x)
                .sum::<f64>())
    }
}

/// One node of a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn validate(&self) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid("tree has no nodes".to_string()));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(ModelError::Invalid(format!(
                            "node {idx} splits on feature {feature} (only {FEATURE_COUNT} exist)"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::Invalid(format!(
                            "node {idx} has a non-finite threshold"
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(ModelError::Invalid(format!(
                                "node {idx} points to invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(ModelError::Invalid(format!(
                            "leaf {idx} has a non-finite value"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        let mut idx = 0;
        // Children always sit after their parent, so a walk visits each node at most once.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = features.get(*feature).ok_or_else(|| {
                        ModelError::Evaluation(format!("feature index {feature} out of range"))
                    })?;
                    idx = if *x <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(ModelError::Evaluation(format!(
                        "node index {idx} out of range"
                    )));
                }
            }
        }
        Err(ModelError::Evaluation(
            "tree walk did not reach a leaf".to_string(),
        ))
    }
}

/// Mean of the outputs of independently fitted regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<RegressionTree>,
}

impl ForestModel {
    fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|e| ModelError::Invalid(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }
}

impl RegressionModel for ForestModel {
    fn kind(&self) -> &'static str {
        "forest"
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Evaluation("forest has no trees".to_string()));
        }
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.evaluate(features)?;
        }
        Ok(total / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(threshold: f64, low: f64, high: f64) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 2,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }
    }

    #[test]
    fn linear_model_is_intercept_plus_dot_product() {
        let model = LinearModel {
            intercept: 1.0,
            coefficients: vec![1.0, 2.0, 0.0, 0.0, 10.0, 0.5],
        };
        let y = model.predict(&[1.0, 1.0, 5.0, 5.0, 0.5, 2.0]).unwrap();
        assert!((y - (1.0 + 1.0 + 2.0 + 5.0 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn linear_model_rejects_wrong_coefficient_count() {
        let artifact = ModelArtifact::Linear(LinearModel {
            intercept: 0.0,
            coefficients: vec![1.0; 5],
        });
        assert!(matches!(artifact.validate(), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn forest_averages_tree_outputs() {
        let forest = ForestModel {
            trees: vec![stump(800.0, 10.0, 20.0), stump(750.0, 30.0, 40.0)],
        };
        // temperature 780: first tree goes left (10), second right (40)
        let y = forest.predict(&[0.0, 0.0, 780.0, 0.0, 0.0, 0.0]).unwrap();
        assert!((y - 25.0).abs() < 1e-12);
    }

    #[test]
    fn split_sends_equal_values_left() {
        let forest = ForestModel {
            trees: vec![stump(800.0, 1.0, 2.0)],
        };
        let y = forest.predict(&[0.0, 0.0, 800.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(y, 1.0);
    }

    #[test]
    fn parses_tagged_json_artifacts() {
        let linear = ModelArtifact::from_json(
            r#"{"kind":"linear","intercept":-35.0,"coefficients":[0.02,0.3,0.05,-0.2,5.0,0.0]}"#,
        )
        .unwrap();
        assert!(matches!(linear, ModelArtifact::Linear(_)));

        let forest = ModelArtifact::from_json(
            r#"{"kind":"forest","trees":[{"nodes":[
                {"feature":2,"threshold":800.0,"left":1,"right":2},
                {"value":20.5},{"value":27.1}]}]}"#,
        )
        .unwrap();
        assert_eq!(
            forest,
            ModelArtifact::Forest(ForestModel {
                trees: vec![stump(800.0, 20.5, 27.1)]
            })
        );
    }

    #[test]
    fn rejects_structurally_broken_trees() {
        let backwards = ForestModel {
            trees: vec![RegressionTree {
                nodes: vec![
                    TreeNode::Leaf { value: 1.0 },
                    TreeNode::Split {
                        feature: 0,
                        threshold: 1.0,
                        left: 0,
                        right: 0,
                    },
                ],
            }],
        };
        assert!(ModelArtifact::Forest(backwards).validate().is_err());

        let bad_feature = ForestModel {
            trees: vec![RegressionTree {
                nodes: vec![
                    TreeNode::Split {
                        feature: 6,
                        threshold: 1.0,
                        left: 1,
                        right: 2,
                    },
                    TreeNode::Leaf { value: 1.0 },
                    TreeNode::Leaf { value: 2.0 },
                ],
            }],
        };
        assert!(ModelArtifact::Forest(bad_feature).validate().is_err());

        let empty = ModelArtifact::Forest(ForestModel { trees: vec![] });
        assert!(empty.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file_as_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn load_reads_artifact_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"kind":"linear","intercept":0.0,"coefficients":[1,0,0,0,0,0]}"#,
        )
        .unwrap();

        let model = ModelArtifact::load(&path).unwrap().into_model().unwrap();
        assert_eq!(model.kind(), "linear");
        assert_eq!(model.predict(&[3.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap(), 3.0);
    }
}
