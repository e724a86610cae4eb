//! Value object marker.
//!
//! Value objects have no identity: two instances with the same fields are the
//! same value. Process parameters and estimates are modelled this way; they
//! are built once and never mutated, so fields stay private behind accessors.

/// Marker for immutable, compared-by-value types.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
