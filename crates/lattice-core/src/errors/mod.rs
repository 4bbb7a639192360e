//! Error hierarchy. Subsystem errors convert into [`LatticeError`] via
//! `From`; callers match on the top-level category or use [`LatticeError::code`].

mod ingest_error;
mod lattice_error;
mod spec_error;
mod store_error;

pub use ingest_error::IngestError;
pub use lattice_error::{LatticeError, LatticeResult};
pub use spec_error::SpecError;
pub use store_error::StoreError;
