//! The atomic mutation batch an import hands to the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LatticeId;
use crate::models::{AssertionRecord, ChangeEvent, PropertyValue};

/// The object end of a claim's `ASSERTED_REL` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectRef {
    Entity(LatticeId),
    PropertyValue(LatticeId),
}

impl ObjectRef {
    pub fn id(&self) -> LatticeId {
        match self {
            ObjectRef::Entity(id) | ObjectRef::PropertyValue(id) => *id,
        }
    }
}

/// A new assertion plus both endpoints of its `ASSERTED_REL` edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssertion {
    pub record: AssertionRecord,
    pub subject: LatticeId,
    pub object: ObjectRef,
}

/// Everything an import materializes in one store transaction: new property
/// values, new assertions with their edges, closes, and the single
/// ChangeEvent that makes the batch visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub workspace_id: String,
    pub new_property_values: Vec<PropertyValue>,
    pub new_assertions: Vec<NewAssertion>,
    /// `(assertion id, valid_to)` for records this batch closes.
    pub closed: Vec<(LatticeId, DateTime<Utc>)>,
    pub change_event: ChangeEvent,
    pub import_run_id: Option<LatticeId>,
}
