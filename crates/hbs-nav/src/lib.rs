//! Read-side queries over a built fragment graph.
//!
//! Provides impact radius (what must be re-tested when a fragment changes),
//! release deltas (what changed since a release), and integrity validation.

pub mod changes;
pub mod impact;
pub mod validate;
