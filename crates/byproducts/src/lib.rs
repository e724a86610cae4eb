//! By-product domain module.
//!
//! Lifecycle rules for by-product batches, implemented as deterministic
//! domain logic (no IO, no storage, no clock).

pub mod batch;
pub mod quantity;
pub mod status;

pub use batch::{
    AssignBatch, Assignee, BatchAssigned, BatchCommand, BatchEvent, BatchRecorded,
    ByProductBatch, DEFAULT_MATERIAL_NAME, DetachSource, RecordBatch, SourceDetached,
    StatusChanged, TransitionStatus,
};
pub use quantity::derive_quantity_kg;
pub use status::{BatchStatus, TransitionPolicy};
