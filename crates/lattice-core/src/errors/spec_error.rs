//! Failures raised while loading mapping specs and domain schemas.

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("spec not found: {name}")]
    SpecNotFound { name: String },

    #[error("workspace not registered: {workspace_id}")]
    WorkspaceNotFound { workspace_id: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("spec {spec_name}: unknown entity type {entity_type}")]
    UnknownEntityType {
        spec_name: String,
        entity_type: String,
    },

    #[error("spec {spec_name}: unknown relationship type {relationship_type}")]
    UnknownRelationshipType {
        spec_name: String,
        relationship_type: String,
    },

    #[error("spec {spec_name}: entity alias {alias} has no key columns")]
    EmptyKeyColumns { spec_name: String, alias: String },

    #[error("spec {spec_name}: relationship references undeclared alias {alias}")]
    UnknownAlias { spec_name: String, alias: String },

    #[error("spec {spec_name}: {reason}")]
    Invalid { spec_name: String, reason: String },

    #[error("io error reading {path}: {reason}")]
    Io { path: String, reason: String },
}
