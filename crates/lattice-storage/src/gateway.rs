//! [`GraphStore`] — the [`GraphGateway`] implementation over SQLite.
//!
//! Reads go through the read pool; every mutation goes through the single
//! writer. `apply_import_batch` is the one place an import becomes visible:
//! the whole batch, ChangeEvent included, commits in one store transaction.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use lattice_core::config::StoreConfig;
use lattice_core::errors::LatticeResult;
use lattice_core::ids::LatticeId;
use lattice_core::keys::AssertionKey;
use lattice_core::models::{
    AssertionRecord, ChangeEvent, Entity, EventStats, ImportBatch, ImportRun, ImportStatus,
    NewAssertion, ObjectRef, PropertyValue, Source,
};
use lattice_core::traits::{EntityFilter, GraphGateway};

use crate::migrations;
use crate::pool::StorePool;
use crate::queries::{
    assertion_ops, edge_ops, entity_ops, event_ops, source_ops, value_ops,
};
use crate::store_err;

pub struct GraphStore {
    pool: StorePool,
}

impl GraphStore {
    /// Open per config and bring the schema up to date.
    pub fn open(config: &StoreConfig) -> LatticeResult<Self> {
        let pool = StorePool::open(config)?;
        pool.writer.with_conn(migrations::run_migrations)?;
        Ok(Self { pool })
    }

    /// Ephemeral store for tests and tooling.
    pub fn open_in_memory() -> LatticeResult<Self> {
        let pool = StorePool::open_in_memory(2)?;
        pool.writer.with_conn(migrations::run_migrations)?;
        Ok(Self { pool })
    }

    fn insert_assertion_tx(conn: &Connection, new: &NewAssertion) -> LatticeResult<()> {
        assertion_ops::insert_record(conn, &new.record)?;
        edge_ops::insert_edge(
            conn,
            &new.record.workspace_id,
            edge_ops::ASSERTED_REL,
            new.subject,
            new.record.id,
        )?;
        edge_ops::insert_edge(
            conn,
            &new.record.workspace_id,
            edge_ops::ASSERTED_REL,
            new.record.id,
            new.object.id(),
        )?;
        Ok(())
    }

    fn insert_change_event_tx(
        conn: &Connection,
        event: &ChangeEvent,
        created: &[LatticeId],
        closed: &[LatticeId],
        import_run_id: Option<LatticeId>,
    ) -> LatticeResult<()> {
        event_ops::insert_event(conn, event)?;
        if let Some(run_id) = import_run_id {
            edge_ops::insert_edge(
                conn,
                &event.workspace_id,
                edge_ops::TRIGGERED_BY,
                event.id,
                run_id,
            )?;
        }
        for id in created {
            edge_ops::insert_edge(
                conn,
                &event.workspace_id,
                edge_ops::CREATED_ASSERTION,
                event.id,
                *id,
            )?;
        }
        for id in closed {
            edge_ops::insert_edge(
                conn,
                &event.workspace_id,
                edge_ops::CLOSED_ASSERTION,
                event.id,
                *id,
            )?;
        }
        Ok(())
    }
}

impl GraphGateway for GraphStore {
    async fn find_entity(
        &self,
        workspace_id: &str,
        entity_type: &str,
        primary_key: &str,
    ) -> LatticeResult<Option<Entity>> {
        self.pool
            .readers
            .with_conn(|c| entity_ops::find_entity(c, workspace_id, entity_type, primary_key))
    }

    async fn get_entity(
        &self,
        workspace_id: &str,
        id: LatticeId,
    ) -> LatticeResult<Option<Entity>> {
        self.pool
            .readers
            .with_conn(|c| entity_ops::get_entity(c, workspace_id, id))
    }

    async fn insert_entity(&self, entity: &Entity) -> LatticeResult<()> {
        self.pool
            .writer
            .with_conn(|c| entity_ops::insert_entity(c, entity))
    }

    async fn search_entities(
        &self,
        workspace_id: &str,
        filter: &EntityFilter,
    ) -> LatticeResult<Vec<Entity>> {
        self.pool
            .readers
            .with_conn(|c| entity_ops::search_entities(c, workspace_id, filter))
    }

    async fn entities_by_ids(
        &self,
        workspace_id: &str,
        ids: &[LatticeId],
    ) -> LatticeResult<Vec<Entity>> {
        self.pool
            .readers
            .with_conn(|c| entity_ops::entities_by_ids(c, workspace_id, ids))
    }

    async fn set_convenience_props(
        &self,
        workspace_id: &str,
        entity_id: LatticeId,
        props: &BTreeMap<String, String>,
    ) -> LatticeResult<()> {
        self.pool
            .writer
            .with_conn(|c| entity_ops::set_convenience_props(c, workspace_id, entity_id, props))
    }

    async fn open_assertions_for_key(
        &self,
        workspace_id: &str,
        key: &AssertionKey,
        scenario_id: &str,
    ) -> LatticeResult<Vec<AssertionRecord>> {
        self.pool
            .readers
            .with_conn(|c| assertion_ops::open_for_key(c, workspace_id, key, scenario_id))
    }

    async fn open_assertions_for_entity(
        &self,
        workspace_id: &str,
        entity_id: LatticeId,
    ) -> LatticeResult<Vec<AssertionRecord>> {
        self.pool
            .readers
            .with_conn(|c| assertion_ops::open_for_entity(c, workspace_id, entity_id))
    }

    async fn open_assertion_keys_by_spec(
        &self,
        workspace_id: &str,
        spec_name: &str,
    ) -> LatticeResult<Vec<AssertionKey>> {
        self.pool
            .readers
            .with_conn(|c| assertion_ops::open_keys_by_spec(c, workspace_id, spec_name))
    }

    async fn assertions_by_ids(
        &self,
        workspace_id: &str,
        ids: &[LatticeId],
    ) -> LatticeResult<Vec<AssertionRecord>> {
        self.pool
            .readers
            .with_conn(|c| assertion_ops::by_ids(c, workspace_id, ids))
    }

    async fn insert_assertion(&self, new: &NewAssertion) -> LatticeResult<()> {
        self.pool.writer.with_conn(|c| {
            let tx = c.unchecked_transaction().map_err(store_err)?;
            Self::insert_assertion_tx(&tx, new)?;
            tx.commit().map_err(store_err)
        })
    }

    async fn close_assertion(
        &self,
        workspace_id: &str,
        id: LatticeId,
        valid_to: DateTime<Utc>,
    ) -> LatticeResult<()> {
        self.pool
            .writer
            .with_conn(|c| assertion_ops::close(c, workspace_id, id, valid_to))
    }

    async fn assertion_object(
        &self,
        workspace_id: &str,
        assertion_id: LatticeId,
    ) -> LatticeResult<Option<ObjectRef>> {
        self.pool
            .readers
            .with_conn(|c| assertion_ops::object_of(c, workspace_id, assertion_id))
    }

    async fn assertion_subject(
        &self,
        workspace_id: &str,
        assertion_id: LatticeId,
    ) -> LatticeResult<Option<LatticeId>> {
        self.pool
            .readers
            .with_conn(|c| assertion_ops::subject_of(c, workspace_id, assertion_id))
    }

    async fn sweep_orphan_assertions(&self, workspace_id: &str) -> LatticeResult<u64> {
        let reaped = self
            .pool
            .writer
            .with_conn(|c| assertion_ops::sweep_orphans(c, workspace_id))?;
        if reaped > 0 {
            debug!(workspace_id, reaped, "reaped orphan assertions");
        }
        Ok(reaped)
    }

    async fn insert_property_value(&self, value: &PropertyValue) -> LatticeResult<()> {
        self.pool
            .writer
            .with_conn(|c| value_ops::insert_value(c, value))
    }

    async fn property_values_by_ids(
        &self,
        workspace_id: &str,
        ids: &[LatticeId],
    ) -> LatticeResult<Vec<PropertyValue>> {
        self.pool
            .readers
            .with_conn(|c| value_ops::by_ids(c, workspace_id, ids))
    }

    async fn insert_change_event(
        &self,
        event: &ChangeEvent,
        created: &[LatticeId],
        closed: &[LatticeId],
        import_run_id: Option<LatticeId>,
    ) -> LatticeResult<()> {
        self.pool.writer.with_conn(|c| {
            let tx = c.unchecked_transaction().map_err(store_err)?;
            Self::insert_change_event_tx(&tx, event, created, closed, import_run_id)?;
            tx.commit().map_err(store_err)
        })
    }

    async fn change_event_for_import(
        &self,
        workspace_id: &str,
        import_run_id: LatticeId,
    ) -> LatticeResult<Option<ChangeEvent>> {
        self.pool
            .readers
            .with_conn(|c| event_ops::event_for_import(c, workspace_id, import_run_id))
    }

    async fn event_assertion_ids(
        &self,
        _workspace_id: &str,
        event_id: LatticeId,
    ) -> LatticeResult<(Vec<LatticeId>, Vec<LatticeId>)> {
        self.pool
            .readers
            .with_conn(|c| event_ops::event_assertion_ids(c, event_id))
    }

    async fn insert_import_run(&self, run: &ImportRun) -> LatticeResult<()> {
        self.pool.writer.with_conn(|c| event_ops::insert_run(c, run))
    }

    async fn finish_import_run(
        &self,
        workspace_id: &str,
        id: LatticeId,
        status: ImportStatus,
        stats: EventStats,
        error: Option<String>,
    ) -> LatticeResult<()> {
        self.pool.writer.with_conn(|c| {
            event_ops::finish_run(c, workspace_id, id, Utc::now(), status, stats, error)
        })
    }

    async fn get_import_run(
        &self,
        workspace_id: &str,
        id: LatticeId,
    ) -> LatticeResult<Option<ImportRun>> {
        self.pool
            .readers
            .with_conn(|c| event_ops::get_run(c, workspace_id, id))
    }

    async fn list_import_runs(
        &self,
        workspace_id: &str,
        limit: usize,
        offset: usize,
    ) -> LatticeResult<Vec<ImportRun>> {
        self.pool
            .readers
            .with_conn(|c| event_ops::list_runs(c, workspace_id, limit, offset))
    }

    async fn upsert_source(&self, source: &Source) -> LatticeResult<Source> {
        self.pool
            .writer
            .with_conn(|c| source_ops::upsert(c, source))
    }

    async fn source_ranks(&self, workspace_id: &str) -> LatticeResult<HashMap<LatticeId, i64>> {
        self.pool
            .readers
            .with_conn(|c| source_ops::ranks(c, workspace_id))
    }

    async fn apply_import_batch(&self, batch: &ImportBatch) -> LatticeResult<()> {
        self.pool.writer.with_conn(|c| {
            let tx = c.unchecked_transaction().map_err(store_err)?;

            for value in &batch.new_property_values {
                value_ops::insert_value(&tx, value)?;
            }
            for new in &batch.new_assertions {
                Self::insert_assertion_tx(&tx, new)?;
            }
            for (id, valid_to) in &batch.closed {
                assertion_ops::close(&tx, &batch.workspace_id, *id, *valid_to)?;
            }

            let created: Vec<LatticeId> =
                batch.new_assertions.iter().map(|n| n.record.id).collect();
            let closed: Vec<LatticeId> = batch.closed.iter().map(|(id, _)| *id).collect();
            Self::insert_change_event_tx(
                &tx,
                &batch.change_event,
                &created,
                &closed,
                batch.import_run_id,
            )?;

            tx.commit().map_err(store_err)?;
            debug!(
                workspace_id = %batch.workspace_id,
                created = created.len(),
                closed = closed.len(),
                "import batch committed"
            );
            Ok(())
        })
    }
}
