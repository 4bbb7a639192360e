//! Assertion records — versioned, evidence-backed claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LatticeId;
use crate::keys::AssertionKey;
use crate::models::Confidence;

/// Where a claim came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Spreadsheet,
    Api,
    Manual,
    Derived,
    Inferred,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Spreadsheet => "spreadsheet",
            SourceType::Api => "api",
            SourceType::Manual => "manual",
            SourceType::Derived => "derived",
            SourceType::Inferred => "inferred",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "spreadsheet" => Some(SourceType::Spreadsheet),
            "api" => Some(SourceType::Api),
            "manual" => Some(SourceType::Manual),
            "derived" => Some(SourceType::Derived),
            "inferred" => Some(SourceType::Inferred),
            _ => None,
        }
    }
}

/// Opaque provenance blob: file, sheet, row index, or an API citation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// 1-based row index within the sheet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    /// Row-level digests, kept for re-save audits alongside the
    /// candidate-level digests stored on the record itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_raw_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_normalized_hash: Option<String>,
}

/// One record per (conceptual fact, source, validity segment).
///
/// Append-only: `valid_to` and `supersedes` are the only fields written
/// after creation, and `valid_to` transitions exactly once from open to a
/// concrete timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionRecord {
    pub id: LatticeId,
    pub workspace_id: String,
    /// Shared by every record asserting the same conceptual fact.
    pub assertion_key: AssertionKey,
    /// `HAS_PROPERTY` for property assertions.
    pub relationship_type: String,
    /// Present iff this is a property assertion.
    pub property_key: Option<String>,
    /// Digest of the candidate's own content, strict serialization.
    pub raw_hash: String,
    /// Digest of the candidate's own content after normalization.
    pub normalized_hash: String,
    pub source_type: SourceType,
    pub source_ref: SourceRef,
    pub source_id: LatticeId,
    pub import_run_id: Option<LatticeId>,
    /// System clock when the claim was learned.
    pub recorded_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    /// `None` means currently valid.
    pub valid_to: Option<DateTime<Utc>>,
    pub scenario_id: String,
    pub confidence: Confidence,
    pub supersedes: Option<LatticeId>,
}

impl AssertionRecord {
    /// Whether the record is currently valid (open interval).
    pub fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }

    /// The digest change detection compares under the given mode.
    pub fn content_hash(&self, normalized: bool) -> &str {
        if normalized {
            &self.normalized_hash
        } else {
            &self.raw_hash
        }
    }
}
