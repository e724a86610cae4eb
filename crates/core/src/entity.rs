//! Entity trait: records that keep their identity across changes.

/// Identity accessor shared by stored records (predictions, users).
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
