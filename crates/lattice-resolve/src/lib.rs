//! # lattice-resolve
//!
//! The resolution engine: given every assertion sharing one key, pick the
//! single winner deterministically, or annotate the full field.

mod engine;

pub use engine::{resolve, resolve_all_claims, AnnotatedAssertion, LossReason, Resolution};
