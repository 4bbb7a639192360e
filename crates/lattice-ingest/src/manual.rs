//! Manual claims — single-assertion mutations outside any import.
//!
//! Each operation binds its effect into exactly one ChangeEvent
//! (`manual_edit` on record, `manual_resolve` on close), reusing the same
//! batch commit that makes imports visible.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::info;

use lattice_core::errors::{LatticeError, LatticeResult};
use lattice_core::ids::{IdKind, LatticeId};
use lattice_core::keys::{AssertionKey, BASE_SCENARIO, HAS_PROPERTY};
use lattice_core::models::{
    Actor, AssertionRecord, ChangeEvent, ChangeEventType, Confidence, EventStats, ImportBatch,
    NewAssertion, ObjectRef, PropertyValue, Source, SourceRef, SourceType, ValueType,
};
use lattice_core::traits::GraphGateway;

use crate::hash;
use crate::orchestrator::IngestEngine;

/// What the manual claim asserts about its subject.
#[derive(Debug, Clone)]
pub enum ManualTarget {
    Property {
        property_key: String,
        value: String,
        value_type: ValueType,
    },
    Relationship {
        relationship_type: String,
        to_entity_type: String,
        to_primary_key: String,
    },
}

#[derive(Debug, Clone)]
pub struct ManualAssertionRequest {
    pub workspace_id: String,
    pub entity_type: String,
    pub primary_key: String,
    pub target: ManualTarget,
    /// `base` or a what-if branch label.
    pub scenario_id: String,
    pub confidence: f64,
    /// Defaults to now.
    pub valid_from: Option<DateTime<Utc>>,
    pub source_name: String,
    pub actor: Actor,
    pub note: Option<String>,
}

impl<G: GraphGateway> IngestEngine<G> {
    /// Record one manual claim. Any open claim for the same key from the
    /// same manual source closes in the same event (I2: close before
    /// replace).
    pub async fn record_manual_assertion(
        &self,
        request: ManualAssertionRequest,
    ) -> LatticeResult<LatticeId> {
        let ws = &request.workspace_id;
        let schema = self.registry.schema(ws)?;
        if !schema.has_entity_type(&request.entity_type) {
            return Err(LatticeError::Validation(format!(
                "unknown entity type {}",
                request.entity_type
            )));
        }

        let subject = self
            .gateway
            .find_entity(ws, &request.entity_type, &request.primary_key)
            .await?
            .ok_or_else(|| {
                LatticeError::not_found(
                    "entity",
                    format!("{}:{}", request.entity_type, request.primary_key),
                )
            })?;

        let (key, relationship_type, property_key, content_hash, object) = match &request.target {
            ManualTarget::Property {
                property_key,
                value,
                value_type,
            } => {
                if schema
                    .property_type(&request.entity_type, property_key)
                    .is_none()
                {
                    return Err(LatticeError::Validation(format!(
                        "property {} not declared on entity type {}",
                        property_key, request.entity_type
                    )));
                }
                let value_id = LatticeId::mint(IdKind::PropertyValue);
                (
                    AssertionKey::property(
                        ws,
                        &request.entity_type,
                        &request.primary_key,
                        property_key,
                    ),
                    HAS_PROPERTY.to_string(),
                    Some(property_key.clone()),
                    hash::property_content_hash(property_key, value),
                    ObjectRef::PropertyValue(value_id),
                )
            }
            ManualTarget::Relationship {
                relationship_type,
                to_entity_type,
                to_primary_key,
            } => {
                if schema.relationship_type(relationship_type).is_none() {
                    return Err(LatticeError::Validation(format!(
                        "unknown relationship type {relationship_type}"
                    )));
                }
                let to = self
                    .gateway
                    .find_entity(ws, to_entity_type, to_primary_key)
                    .await?
                    .ok_or_else(|| {
                        LatticeError::not_found(
                            "entity",
                            format!("{to_entity_type}:{to_primary_key}"),
                        )
                    })?;
                (
                    AssertionKey::relationship(
                        ws,
                        &request.entity_type,
                        &request.primary_key,
                        relationship_type,
                        to_entity_type,
                        to_primary_key,
                    ),
                    relationship_type.clone(),
                    None,
                    hash::relationship_content_hash(
                        &request.entity_type,
                        &request.primary_key,
                        relationship_type,
                        to_entity_type,
                        to_primary_key,
                    ),
                    ObjectRef::Entity(to.id),
                )
            }
        };

        let source = self
            .gateway
            .upsert_source(&Source {
                id: LatticeId::mint(IdKind::Source),
                workspace_id: ws.clone(),
                source_name: request.source_name.clone(),
                source_type: SourceType::Manual,
                authority_domains: Vec::new(),
                authority_rank: None,
            })
            .await?;

        let now = Utc::now();

        // Same-source predecessor closes in the same event.
        let open = self
            .gateway
            .open_assertions_for_key(ws, &key, &request.scenario_id)
            .await?;
        let predecessor = open
            .iter()
            .find(|r| r.source_id == source.id && r.scenario_id == request.scenario_id);

        let record = AssertionRecord {
            id: LatticeId::mint(IdKind::Assertion),
            workspace_id: ws.clone(),
            assertion_key: key,
            relationship_type,
            property_key,
            raw_hash: content_hash.clone(),
            normalized_hash: content_hash,
            source_type: SourceType::Manual,
            source_ref: SourceRef {
                citation: request.note.clone(),
                ..SourceRef::default()
            },
            source_id: source.id,
            import_run_id: None,
            recorded_at: now,
            valid_from: request.valid_from.unwrap_or(now),
            valid_to: None,
            scenario_id: request.scenario_id.clone(),
            confidence: Confidence::new(request.confidence),
            supersedes: predecessor.map(|r| r.id),
        };
        let record_id = record.id;

        let mut new_property_values = Vec::new();
        if let (ObjectRef::PropertyValue(value_id), ManualTarget::Property { property_key, value, value_type }) =
            (&object, &request.target)
        {
            new_property_values.push(PropertyValue {
                id: *value_id,
                workspace_id: ws.clone(),
                property_key: property_key.clone(),
                value: value.clone(),
                value_type: *value_type,
            });
        }

        let closed: Vec<(LatticeId, DateTime<Utc>)> =
            predecessor.iter().map(|r| (r.id, now)).collect();
        let stats = EventStats {
            created: 1,
            closed: closed.len() as u64,
            unchanged: 0,
        };
        let batch = ImportBatch {
            workspace_id: ws.clone(),
            new_property_values,
            new_assertions: vec![NewAssertion {
                record,
                subject: subject.id,
                object,
            }],
            closed,
            change_event: ChangeEvent {
                id: LatticeId::mint(IdKind::ChangeEvent),
                workspace_id: ws.clone(),
                event_type: ChangeEventType::ManualEdit,
                ts: now,
                actor: request.actor.clone(),
                stats,
                descr: request
                    .note
                    .clone()
                    .unwrap_or_else(|| "manual assertion".to_string()),
            },
            import_run_id: None,
        };
        self.gateway.apply_import_batch(&batch).await?;
        info!(workspace_id = %ws, assertion = %record_id, "manual assertion recorded");

        if request.scenario_id == BASE_SCENARIO {
            let affected = BTreeSet::from([subject.id]);
            self.refresh_convenience(ws, &affected, now).await?;
        }
        Ok(record_id)
    }

    /// Close one claim by hand. The close binds into a `manual_resolve`
    /// ChangeEvent.
    pub async fn close_manual_assertion(
        &self,
        workspace_id: &str,
        assertion_id: LatticeId,
        actor: Actor,
        note: Option<String>,
    ) -> LatticeResult<()> {
        let record = self
            .gateway
            .assertions_by_ids(workspace_id, &[assertion_id])
            .await?
            .pop()
            .ok_or_else(|| LatticeError::not_found("assertion", assertion_id.to_string()))?;
        if !record.is_open() {
            return Err(LatticeError::Conflict(format!(
                "assertion {assertion_id} is already closed"
            )));
        }

        let now = Utc::now();
        let batch = ImportBatch {
            workspace_id: workspace_id.to_string(),
            new_property_values: Vec::new(),
            new_assertions: Vec::new(),
            closed: vec![(assertion_id, now)],
            change_event: ChangeEvent {
                id: LatticeId::mint(IdKind::ChangeEvent),
                workspace_id: workspace_id.to_string(),
                event_type: ChangeEventType::ManualResolve,
                ts: now,
                actor,
                stats: EventStats {
                    created: 0,
                    closed: 1,
                    unchanged: 0,
                },
                descr: note.unwrap_or_else(|| "manual close".to_string()),
            },
            import_run_id: None,
        };
        self.gateway.apply_import_batch(&batch).await?;

        if let Some(subject) = self
            .gateway
            .assertion_subject(workspace_id, assertion_id)
            .await?
        {
            let affected = BTreeSet::from([subject]);
            self.refresh_convenience(workspace_id, &affected, now).await?;
        }
        Ok(())
    }
}
