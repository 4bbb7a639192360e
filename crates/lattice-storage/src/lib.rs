//! # lattice-storage
//!
//! SQLite persistence for the lattice evidence graph, exposed through the
//! [`lattice_core::traits::GraphGateway`] contract. Single write connection
//! plus a read pool (WAL mode). No other crate emits store-native query
//! text; the store-specific vocabulary (reserved-word renames, null
//! quirks, datetime encoding) lives entirely here.

pub mod escape;
pub mod gateway;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use gateway::GraphStore;

use lattice_core::errors::{LatticeError, StoreError};

/// Helper to convert a backend failure into the store error category.
pub(crate) fn store_err(e: impl ToString) -> LatticeError {
    LatticeError::Store(StoreError::Backend {
        message: e.to_string(),
    })
}
