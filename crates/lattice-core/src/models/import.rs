//! Import run metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LatticeId;
use crate::models::EventStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Running,
    Ok,
    Failed,
}

impl ImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStatus::Running => "running",
            ImportStatus::Ok => "ok",
            ImportStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(ImportStatus::Running),
            "ok" => Some(ImportStatus::Ok),
            "failed" => Some(ImportStatus::Failed),
            _ => None,
        }
    }
}

/// One row per ingestion. Immutable once finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: LatticeId,
    pub workspace_id: String,
    pub spec_name: String,
    pub source_filename: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: ImportStatus,
    pub stats: EventStats,
    /// Failure detail when status is `failed`.
    pub error: Option<String>,
}
