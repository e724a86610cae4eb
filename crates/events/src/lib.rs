//! Lifecycle events and the envelope they are stored in.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
