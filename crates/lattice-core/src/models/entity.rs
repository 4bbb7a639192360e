//! Domain entities.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LatticeId;

/// A domain object (Location, Device, Connection, …). Created on first
/// sighting per `(workspace_id, entity_type, primary_key)`, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: LatticeId,
    pub workspace_id: String,
    /// Schema-declared type name.
    pub entity_type: String,
    /// Unique per `(workspace_id, entity_type)`.
    pub primary_key: String,
    pub display_name: String,
    /// Derived flattened copy of the current resolved property values.
    /// Regenerated on every import; never authoritative.
    #[serde(default)]
    pub convenience_props: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}
