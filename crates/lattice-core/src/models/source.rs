//! Registered claim sources.

use serde::{Deserialize, Serialize};

use crate::ids::LatticeId;
use crate::models::SourceType;

/// A registered origin of claims. `authority_rank` orders competing sources:
/// lower rank wins at resolution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: LatticeId,
    pub workspace_id: String,
    /// Upsert key within a workspace.
    pub source_name: String,
    pub source_type: SourceType,
    /// Entity/relationship types this source is authoritative for.
    #[serde(default)]
    pub authority_domains: Vec<String>,
    /// Lower is higher priority; absent means lowest.
    pub authority_rank: Option<i64>,
}
