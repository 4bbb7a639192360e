//! The import orchestrator.
//!
//! One run: dedup entities, detect changes against current open assertions,
//! open new ones, close gone ones, bind everything into a single
//! ChangeEvent, and record the ImportRun. Concurrent imports are
//! serialized per `(workspace_id, spec_name)`; different specs proceed in
//! parallel.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use lattice_core::errors::{IngestError, LatticeError, LatticeResult};
use lattice_core::ids::{IdKind, LatticeId};
use lattice_core::keys::{AssertionKey, BASE_SCENARIO, HAS_PROPERTY};
use lattice_core::models::{
    Actor, AssertionRecord, ChangeEvent, ChangeEventType, Confidence, Entity, EventStats,
    ImportBatch, ImportRun, ImportStatus, NewAssertion, ObjectRef, PropertyValue, Source,
    SourceRef, SourceType, ValueType,
};
use lattice_core::traits::GraphGateway;
use lattice_spec::mapping::MappingSpec;
use lattice_spec::schema::DomainSchema;
use lattice_spec::{SpecCache, WorkspaceRegistry};

use crate::stage::{self, StagedRow};
use crate::workbook::Workbook;

/// Caller-supplied context for one import.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ImportOptions {
    pub actor: Actor,
    /// Propagated into every step; exceeding it fails the run.
    pub deadline: Option<DateTime<Utc>>,
}

impl ImportOptions {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            deadline: None,
        }
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::new(Actor::System("importer".to_string()))
    }
}

/// What `POST /w/{wid}/imports` reports back after the synchronous run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImportOutcome {
    pub import_run_id: LatticeId,
    pub change_event_id: LatticeId,
    pub status: ImportStatus,
    pub stats: EventStats,
}

/// What one candidate assertion points at.
enum CandidateObject {
    Entity(LatticeId),
    Property {
        property_key: String,
        value: String,
        value_type: ValueType,
    },
}

/// One assertion a staged row would produce.
struct Candidate {
    key: AssertionKey,
    relationship_type: String,
    property_key: Option<String>,
    raw_hash: String,
    normalized_hash: String,
    subject: LatticeId,
    object: CandidateObject,
    source_ref: SourceRef,
}

impl Candidate {
    fn content_hash(&self, normalized: bool) -> &str {
        if normalized {
            &self.normalized_hash
        } else {
            &self.raw_hash
        }
    }
}

pub struct IngestEngine<G> {
    pub(crate) gateway: Arc<G>,
    pub(crate) registry: Arc<WorkspaceRegistry>,
    specs: Arc<SpecCache>,
    import_locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl<G: GraphGateway> IngestEngine<G> {
    pub fn new(gateway: Arc<G>, registry: Arc<WorkspaceRegistry>, specs: Arc<SpecCache>) -> Self {
        Self {
            gateway,
            registry,
            specs,
            import_locks: DashMap::new(),
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    fn check_deadline(options: &ImportOptions, step: &'static str) -> LatticeResult<()> {
        if let Some(deadline) = options.deadline {
            if Utc::now() >= deadline {
                return Err(IngestError::DeadlineExceeded { step }.into());
            }
        }
        Ok(())
    }

    /// Run an import from a source file path.
    pub async fn run_import(
        &self,
        workspace_id: &str,
        spec_name: &str,
        source_path: impl AsRef<Path>,
        options: ImportOptions,
    ) -> LatticeResult<ImportOutcome> {
        let workbook = Workbook::open(source_path)?;
        self.run_import_workbook(workspace_id, spec_name, &workbook, options)
            .await
    }

    /// Run an import from an already-opened workbook.
    pub async fn run_import_workbook(
        &self,
        workspace_id: &str,
        spec_name: &str,
        workbook: &Workbook,
        options: ImportOptions,
    ) -> LatticeResult<ImportOutcome> {
        // Cooperative per-spec serialization; held for the whole run.
        let lock = self
            .import_locks
            .entry((workspace_id.to_string(), spec_name.to_string()))
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        // (1) Load + validate.
        let spec = self.specs.get(spec_name)?;
        if spec.workspace_id != workspace_id {
            return Err(LatticeError::Validation(format!(
                "spec {spec_name} targets workspace {}, request is for {workspace_id}",
                spec.workspace_id
            )));
        }
        let schema = self.registry.schema(workspace_id)?;
        self.registry.validate(&spec)?;

        // Leftovers of a crashed historical run must not shadow this one.
        self.gateway.sweep_orphan_assertions(workspace_id).await?;

        let source = self
            .gateway
            .upsert_source(&Source {
                id: LatticeId::mint(IdKind::Source),
                workspace_id: workspace_id.to_string(),
                source_name: spec.source_authority.source_name.clone(),
                source_type: SourceType::Spreadsheet,
                authority_domains: spec.source_authority.authority_domains.clone(),
                authority_rank: spec.source_authority.authority_rank,
            })
            .await?;

        let now = Utc::now();
        let run = ImportRun {
            id: LatticeId::mint(IdKind::ImportRun),
            workspace_id: workspace_id.to_string(),
            spec_name: spec_name.to_string(),
            source_filename: workbook.filename.clone(),
            started_at: now,
            finished_at: None,
            status: ImportStatus::Running,
            stats: EventStats::default(),
            error: None,
        };
        self.gateway.insert_import_run(&run).await?;
        info!(workspace_id, spec_name, import_run = %run.id, "import started");

        match self
            .execute(&spec, &schema, workbook, &source, run.id, &options, now)
            .await
        {
            Ok((stats, change_event_id)) => {
                self.gateway
                    .finish_import_run(workspace_id, run.id, ImportStatus::Ok, stats, None)
                    .await?;
                info!(
                    workspace_id,
                    spec_name,
                    created = stats.created,
                    closed = stats.closed,
                    unchanged = stats.unchanged,
                    "import finished"
                );
                Ok(ImportOutcome {
                    import_run_id: run.id,
                    change_event_id,
                    status: ImportStatus::Ok,
                    stats,
                })
            }
            Err(e) => {
                warn!(workspace_id, spec_name, error = %e, "import failed");
                // Partially created entities stay (deduplicated on retry);
                // assertions without a ChangeEvent never committed.
                if let Err(finish_err) = self
                    .gateway
                    .finish_import_run(
                        workspace_id,
                        run.id,
                        ImportStatus::Failed,
                        EventStats::default(),
                        Some(e.to_string()),
                    )
                    .await
                {
                    warn!(import_run = %run.id, "failed to mark run failed: {finish_err}");
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        spec: &MappingSpec,
        schema: &DomainSchema,
        workbook: &Workbook,
        source: &Source,
        run_id: LatticeId,
        options: &ImportOptions,
        now: DateTime<Utc>,
    ) -> LatticeResult<(EventStats, LatticeId)> {
        let workspace_id = &spec.workspace_id;

        // (2) Parse into staged rows; row digests computed alongside.
        Self::check_deadline(options, "parse")?;
        let staged = stage::stage_rows(workbook, spec, schema)?;
        debug!(rows = staged.len(), "staged source rows");

        // (3) Upsert entities, cached per (type, pk) for the whole run.
        Self::check_deadline(options, "upsert_entities")?;
        let entities = self.upsert_entities(workspace_id, &staged, now).await?;

        // (4) Materialize candidate assertions, first sighting of a key
        // wins within one run.
        let candidates = Self::materialize_candidates(spec, workbook, &staged, &entities)?;

        // (5) Change-detect each candidate against the open records of the
        // same source; other sources' claims co-exist.
        Self::check_deadline(options, "change_detect")?;
        let normalized = spec.normalized_mode();
        let candidate_keys: BTreeSet<AssertionKey> = candidates.keys().cloned().collect();
        let mut to_create: Vec<(Candidate, Option<LatticeId>)> = Vec::new();
        let mut to_close: Vec<AssertionRecord> = Vec::new();
        let mut unchanged = 0u64;

        for (key, candidate) in candidates {
            let open = self
                .gateway
                .open_assertions_for_key(workspace_id, &key, BASE_SCENARIO)
                .await?;
            let same_source: Vec<&AssertionRecord> =
                open.iter().filter(|r| r.source_id == source.id).collect();
            match same_source.as_slice() {
                [] => to_create.push((candidate, None)),
                [existing] => {
                    if existing.content_hash(normalized) == candidate.content_hash(normalized) {
                        unchanged += 1;
                    } else {
                        to_create.push((candidate, Some(existing.id)));
                        to_close.push((*existing).clone());
                    }
                }
                many => {
                    return Err(LatticeError::Internal(format!(
                        "{} open assertions for key {key} from source {}; expected at most one",
                        many.len(),
                        source.source_name
                    )));
                }
            }
        }

        // (6) Disappearance: keys this spec asserted before and does not
        // assert now get closed, same source only.
        Self::check_deadline(options, "disappearance")?;
        let previous = self
            .gateway
            .open_assertion_keys_by_spec(workspace_id, &spec.spec_name)
            .await?;
        for key in previous {
            if candidate_keys.contains(&key) {
                continue;
            }
            let open = self
                .gateway
                .open_assertions_for_key(workspace_id, &key, BASE_SCENARIO)
                .await?;
            for record in open {
                if record.source_id == source.id {
                    to_close.push(record);
                }
            }
        }

        // (7)+(8) Materialize everything under one ChangeEvent; the commit
        // is the visibility boundary.
        Self::check_deadline(options, "materialize")?;
        let (batch, stats) = self
            .build_batch(workspace_id, spec, source, run_id, options, now, to_create, &to_close, unchanged)
            .await?;
        let change_event_id = batch.change_event.id;
        self.gateway.apply_import_batch(&batch).await?;

        // Convenience properties are derived; regenerate for every entity
        // the batch touched.
        Self::check_deadline(options, "convenience_props")?;
        let mut affected: BTreeSet<LatticeId> =
            batch.new_assertions.iter().map(|n| n.subject).collect();
        for record in &to_close {
            if let Some(subject) = self
                .gateway
                .assertion_subject(workspace_id, record.id)
                .await?
            {
                affected.insert(subject);
            }
        }
        self.refresh_convenience(workspace_id, &affected, now).await?;

        Ok((stats, change_event_id))
    }

    async fn upsert_entities(
        &self,
        workspace_id: &str,
        staged: &[StagedRow],
        now: DateTime<Utc>,
    ) -> LatticeResult<HashMap<(String, String), Entity>> {
        let mut cache: HashMap<(String, String), Entity> = HashMap::new();
        for row in staged {
            for candidate in &row.entities {
                let key = (candidate.entity_type.clone(), candidate.primary_key.clone());
                if cache.contains_key(&key) {
                    continue;
                }
                let existing = self
                    .gateway
                    .find_entity(workspace_id, &candidate.entity_type, &candidate.primary_key)
                    .await?;
                let entity = match existing {
                    Some(entity) => entity,
                    None => {
                        let entity = Entity {
                            id: LatticeId::mint(IdKind::Entity),
                            workspace_id: workspace_id.to_string(),
                            entity_type: candidate.entity_type.clone(),
                            primary_key: candidate.primary_key.clone(),
                            display_name: candidate.display_name.clone(),
                            convenience_props: BTreeMap::new(),
                            created_at: now,
                        };
                        match self.gateway.insert_entity(&entity).await {
                            Ok(()) => entity,
                            // A concurrent import of another spec may have
                            // won the race; the store row is authoritative.
                            Err(LatticeError::Conflict(_)) => self
                                .gateway
                                .find_entity(
                                    workspace_id,
                                    &candidate.entity_type,
                                    &candidate.primary_key,
                                )
                                .await?
                                .ok_or_else(|| {
                                    LatticeError::Internal(format!(
                                        "entity ({workspace_id}, {}, {}) vanished after conflict",
                                        candidate.entity_type, candidate.primary_key
                                    ))
                                })?,
                            Err(e) => return Err(e),
                        }
                    }
                };
                cache.insert(key, entity);
            }
        }
        Ok(cache)
    }

    fn materialize_candidates(
        spec: &MappingSpec,
        workbook: &Workbook,
        staged: &[StagedRow],
        entities: &HashMap<(String, String), Entity>,
    ) -> LatticeResult<BTreeMap<AssertionKey, Candidate>> {
        let workspace_id = &spec.workspace_id;
        let mut candidates: BTreeMap<AssertionKey, Candidate> = BTreeMap::new();
        let mut push = |key: AssertionKey, candidate: Candidate| {
            if candidates.contains_key(&key) {
                debug!(key = %key, "duplicate candidate key in one import; first sighting wins");
            } else {
                candidates.insert(key, candidate);
            }
        };

        for row in staged {
            let provenance = SourceRef {
                file: Some(workbook.filename.clone()),
                sheet: Some(row.sheet.clone()),
                row: Some(row.row_index),
                citation: None,
                row_raw_hash: Some(row.raw_hash.clone()),
                row_normalized_hash: Some(row.normalized_hash.clone()),
            };

            for entity_candidate in &row.entities {
                let entity_key = (
                    entity_candidate.entity_type.clone(),
                    entity_candidate.primary_key.clone(),
                );
                let Some(subject) = entities.get(&entity_key) else {
                    continue;
                };
                for prop in &entity_candidate.properties {
                    let key = AssertionKey::property(
                        workspace_id,
                        &entity_candidate.entity_type,
                        &entity_candidate.primary_key,
                        &prop.property_key,
                    );
                    push(
                        key.clone(),
                        Candidate {
                            key,
                            relationship_type: HAS_PROPERTY.to_string(),
                            property_key: Some(prop.property_key.clone()),
                            raw_hash: crate::hash::property_content_hash(
                                &prop.property_key,
                                &prop.raw_serialized,
                            ),
                            normalized_hash: crate::hash::property_content_hash(
                                &prop.property_key,
                                &prop.normalized,
                            ),
                            subject: subject.id,
                            object: CandidateObject::Property {
                                property_key: prop.property_key.clone(),
                                value: prop.value.clone(),
                                value_type: prop.value_type,
                            },
                            source_ref: provenance.clone(),
                        },
                    );
                }
            }

            for rel in &row.relationships {
                let find = |alias: &str| {
                    row.entities
                        .iter()
                        .find(|e| e.alias == alias)
                        .and_then(|c| entities.get(&(c.entity_type.clone(), c.primary_key.clone())))
                };
                let (Some(from), Some(to)) = (find(&rel.from_alias), find(&rel.to_alias)) else {
                    continue;
                };
                let key = AssertionKey::relationship(
                    workspace_id,
                    &from.entity_type,
                    &from.primary_key,
                    &rel.relationship_type,
                    &to.entity_type,
                    &to.primary_key,
                );
                let content_hash = crate::hash::relationship_content_hash(
                    &from.entity_type,
                    &from.primary_key,
                    &rel.relationship_type,
                    &to.entity_type,
                    &to.primary_key,
                );
                push(
                    key.clone(),
                    Candidate {
                        key,
                        relationship_type: rel.relationship_type.clone(),
                        property_key: None,
                        raw_hash: content_hash.clone(),
                        normalized_hash: content_hash,
                        subject: from.id,
                        object: CandidateObject::Entity(to.id),
                        source_ref: provenance.clone(),
                    },
                );
            }
        }
        Ok(candidates)
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_batch(
        &self,
        workspace_id: &str,
        spec: &MappingSpec,
        source: &Source,
        run_id: LatticeId,
        options: &ImportOptions,
        now: DateTime<Utc>,
        to_create: Vec<(Candidate, Option<LatticeId>)>,
        to_close: &[AssertionRecord],
        unchanged: u64,
    ) -> LatticeResult<(ImportBatch, EventStats)> {
        let mut new_values: Vec<PropertyValue> = Vec::new();
        let mut new_assertions: Vec<NewAssertion> = Vec::new();

        for (candidate, supersedes) in to_create {
            let object = match &candidate.object {
                CandidateObject::Entity(id) => ObjectRef::Entity(*id),
                CandidateObject::Property {
                    property_key,
                    value,
                    value_type,
                } => {
                    // One value vertex per creating assertion.
                    let value = PropertyValue {
                        id: LatticeId::mint(IdKind::PropertyValue),
                        workspace_id: workspace_id.to_string(),
                        property_key: property_key.clone(),
                        value: value.clone(),
                        value_type: *value_type,
                    };
                    let id = value.id;
                    new_values.push(value);
                    ObjectRef::PropertyValue(id)
                }
            };

            new_assertions.push(NewAssertion {
                record: AssertionRecord {
                    id: LatticeId::mint(IdKind::Assertion),
                    workspace_id: workspace_id.to_string(),
                    assertion_key: candidate.key.clone(),
                    relationship_type: candidate.relationship_type.clone(),
                    property_key: candidate.property_key.clone(),
                    raw_hash: candidate.raw_hash.clone(),
                    normalized_hash: candidate.normalized_hash.clone(),
                    source_type: SourceType::Spreadsheet,
                    source_ref: candidate.source_ref.clone(),
                    source_id: source.id,
                    import_run_id: Some(run_id),
                    recorded_at: now,
                    valid_from: now,
                    valid_to: None,
                    scenario_id: BASE_SCENARIO.to_string(),
                    confidence: Confidence::default(),
                    supersedes,
                },
                subject: candidate.subject,
                object,
            });
        }

        let stats = EventStats {
            created: new_assertions.len() as u64,
            closed: to_close.len() as u64,
            unchanged,
        };

        // Zero-effect runs still emit an event, so the audit trail records
        // the run.
        let change_event = ChangeEvent {
            id: LatticeId::mint(IdKind::ChangeEvent),
            workspace_id: workspace_id.to_string(),
            event_type: ChangeEventType::Import,
            ts: now,
            actor: options.actor.clone(),
            stats,
            descr: format!(
                "import {}: created {}, closed {}, unchanged {}",
                spec.spec_name, stats.created, stats.closed, stats.unchanged
            ),
        };

        let batch = ImportBatch {
            workspace_id: workspace_id.to_string(),
            new_property_values: new_values,
            new_assertions,
            closed: to_close.iter().map(|r| (r.id, now)).collect(),
            change_event,
            import_run_id: Some(run_id),
        };
        Ok((batch, stats))
    }

    /// Rewrite the derived flattened property map of each entity from the
    /// current resolved view.
    pub(crate) async fn refresh_convenience(
        &self,
        workspace_id: &str,
        entity_ids: &BTreeSet<LatticeId>,
        as_of: DateTime<Utc>,
    ) -> LatticeResult<()> {
        if entity_ids.is_empty() {
            return Ok(());
        }
        let ranks = self.gateway.source_ranks(workspace_id).await?;

        for &entity_id in entity_ids {
            let records = self
                .gateway
                .open_assertions_for_entity(workspace_id, entity_id)
                .await?;

            let mut by_key: BTreeMap<&AssertionKey, Vec<&AssertionRecord>> = BTreeMap::new();
            for record in &records {
                by_key.entry(&record.assertion_key).or_default().push(record);
            }

            let mut props: BTreeMap<String, String> = BTreeMap::new();
            for group in by_key.values() {
                let owned: Vec<AssertionRecord> = group.iter().map(|r| (*r).clone()).collect();
                let resolution =
                    lattice_resolve::resolve(&owned, &ranks, BASE_SCENARIO, as_of);
                let Some(winner) = resolution.winner else {
                    continue;
                };
                let Some(property_key) = winner.property_key.clone() else {
                    continue;
                };
                if let Some(ObjectRef::PropertyValue(value_id)) = self
                    .gateway
                    .assertion_object(workspace_id, winner.id)
                    .await?
                {
                    if let Some(value) = self
                        .gateway
                        .property_values_by_ids(workspace_id, &[value_id])
                        .await?
                        .pop()
                    {
                        props.insert(property_key, value.value);
                    }
                }
            }

            self.gateway
                .set_convenience_props(workspace_id, entity_id, &props)
                .await?;
        }
        Ok(())
    }
}
