//! Failures raised by the graph gateway.

/// The backing graph store failed a call, or an operation conflicted with
/// stored state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store call failed: {message}")]
    Backend { message: String },

    #[error("migration v{version:03} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("duplicate entity ({workspace_id}, {entity_type}, {primary_key})")]
    DuplicateEntity {
        workspace_id: String,
        entity_type: String,
        primary_key: String,
    },

    #[error("assertion {id} is already closed")]
    AlreadyClosed { id: String },

    #[error("row decode failed: {message}")]
    Decode { message: String },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }
}
