//! Infrastructure layer: stores, identity lookup, configuration, and the
//! services that tie estimation to the by-product ledger.

pub mod config;
pub mod identity;
pub mod ledger;
pub mod service;
pub mod store;


pub use config::{
    AppConfig, ConfigError, ConfigSource, EstimatorConfig, LedgerConfig, LoadedConfig, SkippedConfig,
};
pub use identity::{Identity, IdentityDirectory, InMemoryIdentityDirectory, Role, UserCounts};
pub use ledger::{ByProductLedger, LedgerError, LedgerSummary};
pub use service::{Overview, ProductionService, Submission, SubmitError};
pub use store::{
    AgentRef, BatchOrder, BatchQuery, BatchStats, BatchStore, InMemoryBatchStore,
    InMemoryPredictionStore, PredictionRecord, PredictionStore, StoreError,
};
