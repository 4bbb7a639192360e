//! # lattice-query
//!
//! The workspace-scoped read surface: entity search over indexes, entity
//! detail assembled through the resolution engine, and import diffs. The
//! response types are plain serde structs; the JSON the HTTP layer
//! returns is exactly what this crate assembles.

pub mod response;
pub mod service;

pub use response::{
    AssertionView, DiffEntry, EntityDetail, EntityRef, EntitySummary, ImportDiff, ObjectView,
    Page, PropertyClaim, PropertyView, RelationshipClaim, RelationshipView, SearchParams,
    ViewMode,
};
pub use service::QueryService;
