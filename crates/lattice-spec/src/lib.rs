//! # lattice-spec
//!
//! Declarative ingest configuration: mapping specifications describing one
//! tabular source each, domain schemas declaring what a workspace may
//! contain, and the registry that validates one against the other.

pub mod cache;
pub mod mapping;
pub mod registry;
pub mod schema;
pub mod validate;

pub use cache::SpecCache;
pub use mapping::MappingSpec;
pub use registry::WorkspaceRegistry;
pub use schema::DomainSchema;
