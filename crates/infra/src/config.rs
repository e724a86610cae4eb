//! Application configuration.
//!
//! Load with [`AppConfig::load`] or [`AppConfig::discover`], which search:
//! 1. `$ALUTRACK_CONFIG`
//! 2. `./alutrack.toml` in the working directory
//! 3. Built-in defaults
//!
//! Every section and field is optional in the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use alutrack_ai::DEFAULT_BYPRODUCT_RATIO;
use alutrack_byproducts::{DEFAULT_MATERIAL_NAME, TransitionPolicy};
use alutrack_observability::TracingConfig;

pub const CONFIG_ENV_VAR: &str = "ALUTRACK_CONFIG";
pub const LOCAL_CONFIG_FILE: &str = "alutrack.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// JSON model artifact. A missing file leaves the estimator unavailable.
    pub model_path: PathBuf,
    /// Share of predicted yield reported as by-product percentage.
    pub byproduct_ratio: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yield_model.json"),
            byproduct_ratio: DEFAULT_BYPRODUCT_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub material_name: String,
    pub transition_policy: TransitionPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            material_name: DEFAULT_MATERIAL_NAME.to_string(),
            transition_policy: TransitionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub estimator: EstimatorConfig,
    pub ledger: LedgerConfig,
    pub logging: TracingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// The file named by `$ALUTRACK_CONFIG`.
    Explicit(PathBuf),
    Local(PathBuf),
    Defaults,
}

/// A candidate file passed over during the search, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedConfig {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of the config search.
///
/// Loading happens before logging is configured, so nothing is logged while
/// searching. Call [`LoadedConfig::report`] once a subscriber is installed.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub source: ConfigSource,
    pub skipped: Vec<SkippedConfig>,
}

impl LoadedConfig {
    /// Log where the config came from and every file that was skipped.
    pub fn report(&self) {
        for skipped in &self.skipped {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "config file skipped, falling back");
        }
        match &self.source {
            ConfigSource::Explicit(path) => {
                info!(path = %path.display(), "loaded config from {CONFIG_ENV_VAR}")
            }
            ConfigSource::Local(path) => info!(path = %path.display(), "loaded local config"),
            ConfigSource::Defaults => info!("no usable config file, using built-in defaults"),
        }
    }
}

impl AppConfig {
    /// Load using the standard search order and log the outcome.
    ///
    /// Never fails: unreadable or invalid files are skipped. Callers that set
    /// up logging from the result should use [`AppConfig::discover`] and
    /// report afterwards.
    pub fn load() -> Self {
        let loaded = Self::discover();
        loaded.report();
        loaded.config
    }

    /// Standard search order without logging.
    pub fn discover() -> LoadedConfig {
        let from_env = std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
        Self::discover_from(from_env.as_deref(), Path::new(LOCAL_CONFIG_FILE))
    }

    /// Search with explicit candidates: `explicit` (usually from the
    /// environment), then `local`, then defaults.
    pub fn discover_from(explicit: Option<&Path>, local: &Path) -> LoadedConfig {
        let mut skipped = Vec::new();

        if let Some(path) = explicit {
            if path.exists() {
                match Self::load_from_file(path) {
                    Ok(config) => {
                        return LoadedConfig {
                            config,
                            source: ConfigSource::Explicit(path.to_path_buf()),
                            skipped,
                        };
                    }
                    Err(e) => skipped.push(SkippedConfig {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    }),
                }
            } else {
                skipped.push(SkippedConfig {
                    path: path.to_path_buf(),
                    reason: format!("{CONFIG_ENV_VAR} points to a missing file"),
                });
            }
        }

        if local.exists() {
            match Self::load_from_file(local) {
                Ok(config) => {
                    return LoadedConfig {
                        config,
                        source: ConfigSource::Local(local.to_path_buf()),
                        skipped,
                    };
                }
                Err(e) => skipped.push(SkippedConfig {
                    path: local.to_path_buf(),
                    reason: e.to_string(),
                }),
            }
        }

        LoadedConfig {
            config: Self::default(),
            source: ConfigSource::Defaults,
            skipped,
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratio = self.estimator.byproduct_ratio;
        if !(ratio.is_finite() && ratio >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "estimator.byproduct_ratio must be finite and non-negative, got {ratio}"
            )));
        }
        if self.estimator.model_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "estimator.model_path cannot be empty".to_string(),
            ));
        }
        if self.ledger.material_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "ledger.material_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
