//! The read service. Every query re-checks the workspace and never crosses
//! it; detail assembly funnels through the resolution engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use lattice_core::errors::{LatticeError, LatticeResult};
use lattice_core::ids::LatticeId;
use lattice_core::keys::{AssertionKey, BASE_SCENARIO, HAS_PROPERTY};
use lattice_core::models::{AssertionRecord, ImportRun, ObjectRef};
use lattice_core::traits::{EntityFilter, GraphGateway};
use lattice_resolve::{resolve, resolve_all_claims, AnnotatedAssertion};
use lattice_spec::WorkspaceRegistry;

use crate::response::{
    AssertionView, DiffEntry, EntityDetail, EntityRef, EntitySummary, ImportDiff, ObjectView,
    Page, PropertyClaim, PropertyView, RelationshipClaim, RelationshipView, SearchParams,
    ViewMode, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

pub struct QueryService<G> {
    gateway: Arc<G>,
    registry: Arc<WorkspaceRegistry>,
}

impl<G: GraphGateway> QueryService<G> {
    pub fn new(gateway: Arc<G>, registry: Arc<WorkspaceRegistry>) -> Self {
        Self { gateway, registry }
    }

    fn check_workspace(&self, workspace_id: &str) -> LatticeResult<()> {
        self.registry
            .schema(workspace_id)
            .map(|_| ())
            .map_err(|_| LatticeError::not_found("workspace", workspace_id))
    }

    fn clamp_page(limit: Option<usize>, offset: Option<usize>) -> (usize, usize) {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (limit, offset.unwrap_or(0))
    }

    /// Bounded page of entity summaries; index lookups only.
    pub async fn search_entities(
        &self,
        workspace_id: &str,
        params: &SearchParams,
    ) -> LatticeResult<Page<EntitySummary>> {
        self.check_workspace(workspace_id)?;
        let (limit, offset) = Self::clamp_page(params.limit, params.offset);
        let filter = EntityFilter {
            entity_type: params.entity_type.clone(),
            primary_key: params.primary_key.clone(),
            q: params.q.clone(),
            limit,
            offset,
        };
        let entities = self.gateway.search_entities(workspace_id, &filter).await?;
        Ok(Page {
            items: entities.iter().map(EntitySummary::from).collect(),
            limit,
            offset,
        })
    }

    /// Entity detail assembled from the resolved view over every open
    /// assertion whose subject is the entity.
    pub async fn entity_detail(
        &self,
        workspace_id: &str,
        entity_id: LatticeId,
        view_mode: ViewMode,
        scenario_id: Option<&str>,
        as_of: Option<DateTime<Utc>>,
    ) -> LatticeResult<EntityDetail> {
        self.check_workspace(workspace_id)?;
        let entity = self
            .gateway
            .get_entity(workspace_id, entity_id)
            .await?
            .ok_or_else(|| LatticeError::not_found("entity", entity_id.to_string()))?;

        let scenario_id = scenario_id.unwrap_or(BASE_SCENARIO);
        let as_of = as_of.unwrap_or_else(Utc::now);

        let records = self
            .gateway
            .open_assertions_for_entity(workspace_id, entity_id)
            .await?;
        let ranks = self.gateway.source_ranks(workspace_id).await?;

        let mut groups: BTreeMap<AssertionKey, Vec<AssertionRecord>> = BTreeMap::new();
        for record in records {
            groups
                .entry(record.assertion_key.clone())
                .or_default()
                .push(record);
        }
        debug!(entity = %entity_id, keys = groups.len(), "assembling entity detail");

        let mut properties: Vec<PropertyView> = Vec::new();
        let mut relationships: Vec<RelationshipView> = Vec::new();

        for (_, group) in groups {
            let claims: Vec<AnnotatedAssertion> = match view_mode {
                ViewMode::Resolved => resolve(&group, &ranks, scenario_id, as_of)
                    .winner
                    .map(|record| AnnotatedAssertion {
                        record,
                        is_winner: true,
                        reason: None,
                    })
                    .into_iter()
                    .collect(),
                ViewMode::AllClaims => resolve_all_claims(&group, &ranks, scenario_id, as_of),
            };
            if claims.is_empty() {
                continue;
            }

            if group[0].relationship_type == HAS_PROPERTY {
                let property_key = group[0]
                    .property_key
                    .clone()
                    .unwrap_or_else(|| "?".to_string());
                let mut views = Vec::with_capacity(claims.len());
                for claim in &claims {
                    if let Some(view) = self.property_claim(workspace_id, claim).await? {
                        views.push(view);
                    }
                }
                if !views.is_empty() {
                    properties.push(PropertyView {
                        property_key,
                        claims: views,
                    });
                }
            } else {
                let relationship_type = group[0].relationship_type.clone();
                let mut views = Vec::with_capacity(claims.len());
                for claim in &claims {
                    if let Some(view) = self.relationship_claim(workspace_id, claim).await? {
                        views.push(view);
                    }
                }
                if !views.is_empty() {
                    relationships.push(RelationshipView {
                        relationship_type,
                        claims: views,
                    });
                }
            }
        }

        Ok(EntityDetail {
            entity: EntitySummary::from(&entity),
            view_mode,
            scenario_id: scenario_id.to_string(),
            as_of,
            properties,
            relationships,
        })
    }

    async fn property_claim(
        &self,
        workspace_id: &str,
        claim: &AnnotatedAssertion,
    ) -> LatticeResult<Option<PropertyClaim>> {
        let Some(ObjectRef::PropertyValue(value_id)) = self
            .gateway
            .assertion_object(workspace_id, claim.record.id)
            .await?
        else {
            return Ok(None);
        };
        let Some(value) = self
            .gateway
            .property_values_by_ids(workspace_id, &[value_id])
            .await?
            .pop()
        else {
            return Ok(None);
        };
        Ok(Some(PropertyClaim {
            value: value.value,
            value_type: value.value_type,
            assertion: AssertionView::annotated(claim),
        }))
    }

    async fn relationship_claim(
        &self,
        workspace_id: &str,
        claim: &AnnotatedAssertion,
    ) -> LatticeResult<Option<RelationshipClaim>> {
        let Some(ObjectRef::Entity(target_id)) = self
            .gateway
            .assertion_object(workspace_id, claim.record.id)
            .await?
        else {
            return Ok(None);
        };
        let Some(target) = self
            .gateway
            .entities_by_ids(workspace_id, &[target_id])
            .await?
            .pop()
        else {
            return Ok(None);
        };
        Ok(Some(RelationshipClaim {
            target: EntityRef::from(&target),
            assertion: AssertionView::annotated(claim),
        }))
    }

    /// Recent import runs, newest first.
    pub async fn list_import_runs(
        &self,
        workspace_id: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> LatticeResult<Page<ImportRun>> {
        self.check_workspace(workspace_id)?;
        let (limit, offset) = Self::clamp_page(limit, offset);
        let items = self
            .gateway
            .list_import_runs(workspace_id, limit, offset)
            .await?;
        Ok(Page {
            items,
            limit,
            offset,
        })
    }

    pub async fn get_import_run(
        &self,
        workspace_id: &str,
        id: LatticeId,
    ) -> LatticeResult<ImportRun> {
        self.check_workspace(workspace_id)?;
        self.gateway
            .get_import_run(workspace_id, id)
            .await?
            .ok_or_else(|| LatticeError::not_found("import_run", id.to_string()))
    }

    /// The ChangeEvent's created and closed assertions, dereferenced to
    /// keys, content summaries, and endpoint references.
    pub async fn import_diff(
        &self,
        workspace_id: &str,
        import_run_id: LatticeId,
    ) -> LatticeResult<ImportDiff> {
        self.check_workspace(workspace_id)?;
        self.gateway
            .get_import_run(workspace_id, import_run_id)
            .await?
            .ok_or_else(|| LatticeError::not_found("import_run", import_run_id.to_string()))?;
        let event = self
            .gateway
            .change_event_for_import(workspace_id, import_run_id)
            .await?
            .ok_or_else(|| {
                LatticeError::not_found("change_event", import_run_id.to_string())
            })?;

        let (created_ids, closed_ids) = self
            .gateway
            .event_assertion_ids(workspace_id, event.id)
            .await?;

        let mut created = Vec::with_capacity(created_ids.len());
        for record in self
            .gateway
            .assertions_by_ids(workspace_id, &created_ids)
            .await?
        {
            created.push(self.diff_entry(workspace_id, record).await?);
        }
        let mut closed = Vec::with_capacity(closed_ids.len());
        for record in self
            .gateway
            .assertions_by_ids(workspace_id, &closed_ids)
            .await?
        {
            closed.push(self.diff_entry(workspace_id, record).await?);
        }

        Ok(ImportDiff {
            import_run_id,
            change_event_id: event.id,
            created,
            closed,
        })
    }

    async fn diff_entry(
        &self,
        workspace_id: &str,
        record: AssertionRecord,
    ) -> LatticeResult<DiffEntry> {
        let subject = match self
            .gateway
            .assertion_subject(workspace_id, record.id)
            .await?
        {
            Some(id) => self
                .gateway
                .entities_by_ids(workspace_id, &[id])
                .await?
                .pop()
                .map(|e| EntityRef::from(&e)),
            None => None,
        };

        let object = match self
            .gateway
            .assertion_object(workspace_id, record.id)
            .await?
        {
            Some(ObjectRef::Entity(id)) => self
                .gateway
                .entities_by_ids(workspace_id, &[id])
                .await?
                .pop()
                .map(|e| ObjectView::Entity(EntityRef::from(&e))),
            Some(ObjectRef::PropertyValue(id)) => self
                .gateway
                .property_values_by_ids(workspace_id, &[id])
                .await?
                .pop()
                .map(|v| ObjectView::PropertyValue {
                    property_key: v.property_key,
                    value: v.value,
                    value_type: v.value_type,
                }),
            None => None,
        };

        let summary = match (&record.property_key, &object) {
            (Some(key), Some(ObjectView::PropertyValue { value, .. })) => {
                format!("{key} = {value}")
            }
            (Some(key), _) => key.clone(),
            (None, Some(ObjectView::Entity(target))) => format!(
                "{} -> {}:{}",
                record.relationship_type, target.entity_type, target.primary_key
            ),
            (None, _) => record.relationship_type.clone(),
        };

        Ok(DiffEntry {
            assertion_key: record.assertion_key.clone(),
            summary,
            assertion: AssertionView::plain(&record),
            subject,
            object,
        })
    }
}
