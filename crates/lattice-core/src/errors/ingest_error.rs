//! Failures raised by the ingestion pipeline.

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("source file unreadable: {path}: {reason}")]
    SourceUnreadable { path: String, reason: String },

    #[error("sheet {sheet} declared by the spec is missing from the source")]
    MissingSheet { sheet: String },

    #[error("sheet {sheet} has no column {column}")]
    MissingColumn { sheet: String, column: String },

    #[error("import deadline exceeded during {step}")]
    DeadlineExceeded { step: &'static str },

    #[error("another import for spec {spec_name} is already running")]
    ImportBusy { spec_name: String },
}
