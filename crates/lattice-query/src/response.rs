//! Serde response shapes for the read surface.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lattice_core::ids::LatticeId;
use lattice_core::keys::AssertionKey;
use lattice_core::models::{
    AssertionRecord, Confidence, Entity, SourceRef, SourceType, ValueType,
};
use lattice_resolve::{AnnotatedAssertion, LossReason};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Resolved,
    AllClaims,
}

/// Entity search inputs. Pure index lookups; no assertion traversal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub entity_type: Option<String>,
    pub primary_key: Option<String>,
    /// Substring over `display_name`.
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityRef {
    pub id: LatticeId,
    pub entity_type: String,
    pub primary_key: String,
    pub display_name: String,
}

impl From<&Entity> for EntityRef {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            entity_type: entity.entity_type.clone(),
            primary_key: entity.primary_key.clone(),
            display_name: entity.display_name.clone(),
        }
    }
}

/// Entity summary for search results, convenience properties included.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    #[serde(flatten)]
    pub entity: EntityRef,
    pub convenience_props: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Entity> for EntitySummary {
    fn from(entity: &Entity) -> Self {
        Self {
            entity: EntityRef::from(entity),
            convenience_props: entity.convenience_props.clone(),
            created_at: entity.created_at,
        }
    }
}

/// One claim with its standing and provenance.
#[derive(Debug, Clone, Serialize)]
pub struct AssertionView {
    pub id: LatticeId,
    pub assertion_key: AssertionKey,
    pub source_type: SourceType,
    pub source_id: LatticeId,
    pub source_ref: SourceRef,
    pub recorded_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub scenario_id: String,
    pub confidence: Confidence,
    /// Present only when the view came out of the resolution engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_winner: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<LossReason>,
}

impl AssertionView {
    /// A record outside any resolution context (diff listings).
    pub fn plain(record: &AssertionRecord) -> Self {
        Self::new(record, None, None)
    }

    pub fn annotated(claim: &AnnotatedAssertion) -> Self {
        Self::new(&claim.record, Some(claim.is_winner), claim.reason)
    }

    fn new(record: &AssertionRecord, is_winner: Option<bool>, reason: Option<LossReason>) -> Self {
        Self {
            id: record.id,
            assertion_key: record.assertion_key.clone(),
            source_type: record.source_type,
            source_id: record.source_id,
            source_ref: record.source_ref.clone(),
            recorded_at: record.recorded_at,
            valid_from: record.valid_from,
            valid_to: record.valid_to,
            scenario_id: record.scenario_id.clone(),
            confidence: record.confidence,
            is_winner,
            reason,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyClaim {
    pub value: String,
    pub value_type: ValueType,
    pub assertion: AssertionView,
}

/// One property key of the entity. Resolved mode carries the single
/// winner; all-claims mode carries every temporally live claim annotated.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyView {
    pub property_key: String,
    pub claims: Vec<PropertyClaim>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipClaim {
    pub target: EntityRef,
    pub assertion: AssertionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipView {
    pub relationship_type: String,
    pub claims: Vec<RelationshipClaim>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityDetail {
    #[serde(flatten)]
    pub entity: EntitySummary,
    pub view_mode: ViewMode,
    pub scenario_id: String,
    pub as_of: DateTime<Utc>,
    pub properties: Vec<PropertyView>,
    pub relationships: Vec<RelationshipView>,
}

/// The object side of a diff entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectView {
    Entity(EntityRef),
    PropertyValue {
        property_key: String,
        value: String,
        value_type: ValueType,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffEntry {
    pub assertion_key: AssertionKey,
    /// Human-readable content summary.
    pub summary: String,
    pub assertion: AssertionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<EntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportDiff {
    pub import_run_id: LatticeId,
    pub change_event_id: LatticeId,
    pub created: Vec<DiffEntry>,
    pub closed: Vec<DiffEntry>,
}
