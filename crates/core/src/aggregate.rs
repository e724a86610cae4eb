//! Aggregate traits for lifecycle-tracked records.

use crate::error::{DomainError, DomainResult};

/// Aggregate root: identity plus a version counter.
///
/// The version increases by one for every applied event, which is what the
/// stores use to reject writes made against a stale copy.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    fn version(&self) -> u64;
}

/// Version expectation for a write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The record must not exist yet.
    New,
    /// The stored record must be at exactly this version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Does a record currently at `actual` satisfy the expectation?
    ///
    /// `actual` is `None` when nothing is stored under the id.
    pub fn matches(self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (ExpectedVersion::New, None) => true,
            (ExpectedVersion::New, Some(_)) => false,
            (ExpectedVersion::Exact(v), Some(a)) => v == a,
            (ExpectedVersion::Exact(_), None) => false,
        }
    }

    pub fn check(self, actual: Option<u64>) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "version check failed (expected: {self:?}, actual: {actual:?})"
            )))
        }
    }
}

/// Decide/apply split for aggregates.
///
/// `handle` inspects the current state and returns the events a command
/// produces without mutating anything; `apply` evolves state from one event.
/// Neither performs IO.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
