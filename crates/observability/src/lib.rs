//! Process-wide tracing/logging setup.

pub mod tracing;

pub use crate::tracing::TracingConfig;

/// Initialize tracing with defaults (`info`, JSON), overridable via `RUST_LOG`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    crate::tracing::init(&TracingConfig::default());
}

/// Initialize tracing from explicit settings.
pub fn init_with(config: &TracingConfig) {
    crate::tracing::init(config);
}
