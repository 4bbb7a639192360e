//! Top-level error type. All subsystem errors convert into this via `From`.

use super::{IngestError, SpecError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LatticeError {
    /// Malformed spec/schema, unknown types, inputs outside declared bounds.
    /// Recoverable by the caller; never mutates state.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Duplicate entity creation or re-closing a closed assertion.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("spec error: {0}")]
    Spec(#[from] SpecError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invariant violation detected at runtime. Logged with enough context
    /// to reconstruct; surfaces as 5xx.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for LatticeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEntity { .. } | StoreError::AlreadyClosed { .. } => {
                LatticeError::Conflict(e.to_string())
            }
            other => LatticeError::Store(other),
        }
    }
}

impl LatticeError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        LatticeError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            LatticeError::Validation(_) | LatticeError::Spec(_) | LatticeError::Ingest(_) => {
                "validation_error"
            }
            LatticeError::NotFound { .. } => "not_found",
            LatticeError::Conflict(_) => "conflict",
            LatticeError::Store(_) => "store_error",
            LatticeError::Serialization(_) | LatticeError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status category for the transport layer.
    pub fn http_status(&self) -> u16 {
        match self {
            LatticeError::Validation(_) | LatticeError::Spec(_) | LatticeError::Ingest(_) => 400,
            LatticeError::NotFound { .. } => 404,
            LatticeError::Conflict(_) => 409,
            LatticeError::Store(_) => 502,
            LatticeError::Serialization(_) | LatticeError::Internal(_) => 500,
        }
    }
}

/// Convenience alias used across the workspace.
pub type LatticeResult<T> = Result<T, LatticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_category_from_store_conflicts() {
        let err: LatticeError = StoreError::AlreadyClosed {
            id: "asrt_x".into(),
        }
        .into();
        assert_eq!(err.code(), "conflict");
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn backend_failures_are_store_errors() {
        let err: LatticeError = StoreError::backend("disk gone").into();
        assert_eq!(err.code(), "store_error");
        assert_eq!(err.http_status(), 502);
    }
}
