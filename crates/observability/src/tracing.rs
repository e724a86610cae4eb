//! Tracing subscriber initialization.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log output settings, usually read from the `[logging]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Fallback filter directive when `RUST_LOG` is unset (e.g. `"info"`,
    /// `"alutrack_infra=debug,info"`).
    pub filter: String,
    /// JSON lines when true, compact human-readable text otherwise.
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
        }
    }
}

impl TracingConfig {
    /// `RUST_LOG` wins over the configured filter; a bad directive falls back to `info`.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.filter))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber, writing to stderr. Subsequent calls are no-ops.
pub fn init(config: &TracingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(config.env_filter())
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_does_not_panic() {
        init(&TracingConfig::default());
        init(&TracingConfig {
            filter: "debug".to_string(),
            json: false,
        });
    }

    #[test]
    fn bad_filter_falls_back() {
        let cfg = TracingConfig {
            filter: "=[not a filter".to_string(),
            json: true,
        };
        // Must not panic regardless of RUST_LOG in the test environment.
        let _ = cfg.env_filter();
    }
}
