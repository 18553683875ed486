//! Attribute values for scene-graph cooking.
//!
//! # Purpose
//!
//! Every piece of data that flows through an operator graph (op arguments, cooked
//! location attributes, serialized op trees) is an [`Attribute`]: an immutable,
//! reference-counted tree whose equality and hash are defined by content.
//!
//! # Mental model
//!
//! * Leaves are typed value arrays ([`IntAttribute`], [`FloatAttribute`],
//!   [`DoubleAttribute`], [`StringAttribute`]).
//! * Branches are ordered, named children ([`GroupAttribute`]).
//! * [`Attribute::Null`] is the "invalid" sentinel returned by lookups that miss.
//!   Callers branch on [`Attribute::is_valid`] instead of handling errors.
//! * [`GroupBuilder`] is the only mutable piece; it produces fresh groups.
//!
//! # Invariants
//!
//! * Values never change after construction; clones share storage.
//! * Equal content implies equal [`Hash`]. The hash is computed once, at construction.
//! * Group child names are unique; a later `set` of an existing name keeps the
//!   original insertion position.

mod attr;
mod builder;
mod group;
mod hash;

pub use attr::{Attribute, AttributeValue, DataAttribute, DoubleAttribute, FloatAttribute, IntAttribute, StringAttribute};
pub use builder::{BuildMode, GroupBuilder};
pub use group::GroupAttribute;
pub use hash::Hash;

#[cfg(test)]
mod tests;
