//! The graph gateway contract.
//!
//! The gateway is the only component that speaks the backing store's query
//! language. Everything above it works in terms of typed records; porting to
//! a different property-graph store means reimplementing this trait and
//! nothing else.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::errors::LatticeResult;
use crate::ids::LatticeId;
use crate::keys::AssertionKey;
use crate::models::{
    AssertionRecord, ChangeEvent, Entity, EventStats, ImportBatch, ImportRun, ImportStatus,
    NewAssertion, ObjectRef, PropertyValue, Source,
};

/// Index-backed entity search parameters. `limit` is clamped by the caller
/// (default 50, max 500).
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub entity_type: Option<String>,
    pub primary_key: Option<String>,
    /// Substring match over `display_name`.
    pub q: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Typed create/read surface over the backing property-graph store.
#[allow(async_fn_in_trait)]
pub trait GraphGateway: Send + Sync {
    // ── entities ────────────────────────────────────────────────────────

    /// O(1) lookup via the `(workspace_id, entity_type, primary_key)` index.
    async fn find_entity(
        &self,
        workspace_id: &str,
        entity_type: &str,
        primary_key: &str,
    ) -> LatticeResult<Option<Entity>>;

    async fn get_entity(&self, workspace_id: &str, id: LatticeId)
        -> LatticeResult<Option<Entity>>;

    /// Fails with a conflict if a duplicate by
    /// `(workspace_id, entity_type, primary_key)` already exists.
    async fn insert_entity(&self, entity: &Entity) -> LatticeResult<()>;

    async fn search_entities(
        &self,
        workspace_id: &str,
        filter: &EntityFilter,
    ) -> LatticeResult<Vec<Entity>>;

    async fn entities_by_ids(
        &self,
        workspace_id: &str,
        ids: &[LatticeId],
    ) -> LatticeResult<Vec<Entity>>;

    /// Overwrite the derived convenience-property map on one entity.
    async fn set_convenience_props(
        &self,
        workspace_id: &str,
        entity_id: LatticeId,
        props: &BTreeMap<String, String>,
    ) -> LatticeResult<()>;

    // ── assertions ──────────────────────────────────────────────────────

    /// All records for the key with an open validity interval, any source.
    async fn open_assertions_for_key(
        &self,
        workspace_id: &str,
        key: &AssertionKey,
        scenario_id: &str,
    ) -> LatticeResult<Vec<AssertionRecord>>;

    /// Traverses outbound subject `ASSERTED_REL` edges from the entity.
    async fn open_assertions_for_entity(
        &self,
        workspace_id: &str,
        entity_id: LatticeId,
    ) -> LatticeResult<Vec<AssertionRecord>>;

    /// Keys still open that were created by any import run of the spec.
    /// Used for disappearance detection.
    async fn open_assertion_keys_by_spec(
        &self,
        workspace_id: &str,
        spec_name: &str,
    ) -> LatticeResult<Vec<AssertionKey>>;

    async fn assertions_by_ids(
        &self,
        workspace_id: &str,
        ids: &[LatticeId],
    ) -> LatticeResult<Vec<AssertionRecord>>;

    /// Creates the vertex and both `ASSERTED_REL` edges atomically.
    async fn insert_assertion(&self, new: &NewAssertion) -> LatticeResult<()>;

    /// Patches only `valid_to`; refuses to re-close.
    async fn close_assertion(
        &self,
        workspace_id: &str,
        id: LatticeId,
        valid_to: DateTime<Utc>,
    ) -> LatticeResult<()>;

    /// The object endpoint of a claim's `ASSERTED_REL` edge.
    async fn assertion_object(
        &self,
        workspace_id: &str,
        assertion_id: LatticeId,
    ) -> LatticeResult<Option<ObjectRef>>;

    /// The subject entity of a claim: the entity whose `ASSERTED_REL`
    /// edge points at it.
    async fn assertion_subject(
        &self,
        workspace_id: &str,
        assertion_id: LatticeId,
    ) -> LatticeResult<Option<LatticeId>>;

    /// Delete assertions not linked by any `CREATED_ASSERTION` edge (leftovers
    /// of a crashed historical run). Returns how many were reaped.
    async fn sweep_orphan_assertions(&self, workspace_id: &str) -> LatticeResult<u64>;

    // ── property values ─────────────────────────────────────────────────

    /// Property values are subordinate to their creating assertion; one
    /// vertex per assertion.
    async fn insert_property_value(&self, value: &PropertyValue) -> LatticeResult<()>;

    async fn property_values_by_ids(
        &self,
        workspace_id: &str,
        ids: &[LatticeId],
    ) -> LatticeResult<Vec<PropertyValue>>;

    // ── change events & import runs ─────────────────────────────────────

    /// One call per mutation batch; materializes all `CREATED_ASSERTION` /
    /// `CLOSED_ASSERTION` / `TRIGGERED_BY` edges.
    async fn insert_change_event(
        &self,
        event: &ChangeEvent,
        created: &[LatticeId],
        closed: &[LatticeId],
        import_run_id: Option<LatticeId>,
    ) -> LatticeResult<()>;

    async fn change_event_for_import(
        &self,
        workspace_id: &str,
        import_run_id: LatticeId,
    ) -> LatticeResult<Option<ChangeEvent>>;

    /// `(created, closed)` assertion ids linked to the event.
    async fn event_assertion_ids(
        &self,
        workspace_id: &str,
        event_id: LatticeId,
    ) -> LatticeResult<(Vec<LatticeId>, Vec<LatticeId>)>;

    async fn insert_import_run(&self, run: &ImportRun) -> LatticeResult<()>;

    async fn finish_import_run(
        &self,
        workspace_id: &str,
        id: LatticeId,
        status: ImportStatus,
        stats: EventStats,
        error: Option<String>,
    ) -> LatticeResult<()>;

    async fn get_import_run(
        &self,
        workspace_id: &str,
        id: LatticeId,
    ) -> LatticeResult<Option<ImportRun>>;

    async fn list_import_runs(
        &self,
        workspace_id: &str,
        limit: usize,
        offset: usize,
    ) -> LatticeResult<Vec<ImportRun>>;

    // ── sources ─────────────────────────────────────────────────────────

    /// Keyed by `source_name` within the workspace; returns the stored row
    /// (existing id on update).
    async fn upsert_source(&self, source: &Source) -> LatticeResult<Source>;

    /// `source_id → authority_rank` for every registered source. Sources
    /// with no rank are absent (treated as lowest priority by resolution).
    async fn source_ranks(&self, workspace_id: &str) -> LatticeResult<HashMap<LatticeId, i64>>;

    // ── batches ─────────────────────────────────────────────────────────

    /// Apply an import's materialization and its ChangeEvent in one store
    /// transaction. The commit is the visibility boundary for readers.
    async fn apply_import_batch(&self, batch: &ImportBatch) -> LatticeResult<()>;
}
