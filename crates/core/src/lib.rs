//! `alutrack-core`: shared domain building blocks.
//!
//! Identifiers, the domain error model, aggregate/entity/value-object traits
//! and the clock abstraction. No storage, no IO.

pub mod aggregate;
pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{BatchId, PredictionId, UserId};
pub use value_object::ValueObject;
