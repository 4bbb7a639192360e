//! # lattice-core
//!
//! Core vocabulary of the lattice temporal evidence graph: time-sortable
//! identifiers, assertion keys, the six vertex models, the error hierarchy,
//! and configuration. Every other crate in the workspace builds on these
//! types; none of them speak to the backing store directly.

pub mod config;
pub mod errors;
pub mod ids;
pub mod keys;
pub mod models;
pub mod traits;

pub use errors::{LatticeError, LatticeResult};
pub use ids::{IdKind, LatticeId};
pub use keys::AssertionKey;
