//! invrec-reconcile
//!
//! Diff engine: compares two key indexes field by field and partitions the
//! union of their keys into matched / changed / missing-in-target /
//! missing-in-origin.
//!
//! Deterministic, pure logic. No IO. Never calls back into a source or
//! collection, so it can be tested without any network.

mod engine;
mod types;

pub use engine::{changed_fields, diff};
pub use types::*;
