//! ChangeEvent and ImportRun rows.
//!
//! The event table stores its timestamp under `event_ts` and its summary
//! under `descr`: the logical names `timestamp` and `desc` collide with
//! store reserved words and are renamed at this boundary.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use lattice_core::errors::{LatticeError, LatticeResult, StoreError};
use lattice_core::ids::{IdKind, LatticeId};
use lattice_core::models::{
    Actor, ChangeEvent, ChangeEventType, EventStats, ImportRun, ImportStatus,
};

use crate::escape::boundary_column;
use crate::store_err;

use super::{decode_id, encode_ts, opt_ts, parse_ts};

fn event_columns() -> String {
    format!(
        "id, workspace_id, event_type, {ts}, actor_type, actor_id, \
         created_count, closed_count, unchanged_count, {descr}",
        ts = boundary_column("timestamp"),
        descr = boundary_column("desc"),
    )
}

#[allow(clippy::type_complexity)]
fn row_to_event(
    row: &Row<'_>,
) -> rusqlite::Result<(String, String, String, String, String, String, u64, u64, u64, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn decode_event(
    (id, workspace_id, event_type, ts, actor_type, actor_id, created, closed, unchanged, descr): (
        String,
        String,
        String,
        String,
        String,
        String,
        u64,
        u64,
        u64,
        String,
    ),
) -> LatticeResult<ChangeEvent> {
    let event_type = ChangeEventType::parse(&event_type).ok_or_else(|| {
        LatticeError::Store(StoreError::Decode {
            message: format!("unknown event_type {event_type:?}"),
        })
    })?;
    Ok(ChangeEvent {
        id: decode_id(IdKind::ChangeEvent, &id)?,
        workspace_id,
        event_type,
        ts: parse_ts(&ts)?,
        actor: Actor::from_parts(&actor_type, &actor_id),
        stats: EventStats {
            created,
            closed,
            unchanged,
        },
        descr,
    })
}

pub fn insert_event(conn: &Connection, event: &ChangeEvent) -> LatticeResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO change_events ({})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            event_columns()
        ),
        params![
            event.id.storage_hex(),
            event.workspace_id,
            event.event_type.as_str(),
            encode_ts(event.ts),
            event.actor.type_str(),
            event.actor.id_str(),
            event.stats.created,
            event.stats.closed,
            event.stats.unchanged,
            event.descr,
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

/// The event whose `TRIGGERED_BY` edge points at the run.
pub fn event_for_import(
    conn: &Connection,
    workspace_id: &str,
    import_run_id: LatticeId,
) -> LatticeResult<Option<ChangeEvent>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM change_events c
                 JOIN edges e ON e.edge_type = 'TRIGGERED_BY' AND e.from_id = c.id
                 WHERE e.to_id = ?1 AND c.workspace_id = ?2",
                event_columns().replace("workspace_id", "c.workspace_id")
            ),
            params![import_run_id.storage_hex(), workspace_id],
            row_to_event,
        )
        .optional()
        .map_err(store_err)?;
    row.map(decode_event).transpose()
}

/// `(created, closed)` assertion ids linked to the event.
pub fn event_assertion_ids(
    conn: &Connection,
    event_id: LatticeId,
) -> LatticeResult<(Vec<LatticeId>, Vec<LatticeId>)> {
    let created = super::edge_ops::targets_of(conn, super::edge_ops::CREATED_ASSERTION, event_id)?
        .iter()
        .map(|hex| decode_id(IdKind::Assertion, hex))
        .collect::<LatticeResult<Vec<_>>>()?;
    let closed = super::edge_ops::targets_of(conn, super::edge_ops::CLOSED_ASSERTION, event_id)?
        .iter()
        .map(|hex| decode_id(IdKind::Assertion, hex))
        .collect::<LatticeResult<Vec<_>>>()?;
    Ok((created, closed))
}

// ── import runs ─────────────────────────────────────────────────────────

const RUN_COLUMNS: &str = "id, workspace_id, spec_name, source_filename, started_at, \
     finished_at, status, created_count, closed_count, unchanged_count, error";

#[allow(clippy::type_complexity)]
fn row_to_run(
    row: &Row<'_>,
) -> rusqlite::Result<(
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    u64,
    u64,
    u64,
    Option<String>,
)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

#[allow(clippy::type_complexity)]
fn decode_run(
    (id, workspace_id, spec_name, source_filename, started_at, finished_at, status, created, closed, unchanged, error): (
        String,
        String,
        String,
        String,
        String,
        Option<String>,
        String,
        u64,
        u64,
        u64,
        Option<String>,
    ),
) -> LatticeResult<ImportRun> {
    let status = ImportStatus::parse(&status).ok_or_else(|| {
        LatticeError::Store(StoreError::Decode {
            message: format!("unknown import status {status:?}"),
        })
    })?;
    Ok(ImportRun {
        id: decode_id(IdKind::ImportRun, &id)?,
        workspace_id,
        spec_name,
        source_filename,
        started_at: parse_ts(&started_at)?,
        finished_at: opt_ts(finished_at)?,
        status,
        stats: EventStats {
            created,
            closed,
            unchanged,
        },
        error,
    })
}

pub fn insert_run(conn: &Connection, run: &ImportRun) -> LatticeResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO import_runs ({RUN_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            run.id.storage_hex(),
            run.workspace_id,
            run.spec_name,
            run.source_filename,
            encode_ts(run.started_at),
            run.finished_at.map(encode_ts),
            run.status.as_str(),
            run.stats.created,
            run.stats.closed,
            run.stats.unchanged,
            run.error,
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn finish_run(
    conn: &Connection,
    workspace_id: &str,
    id: LatticeId,
    finished_at: DateTime<Utc>,
    status: ImportStatus,
    stats: EventStats,
    error: Option<String>,
) -> LatticeResult<()> {
    let changed = conn
        .execute(
            "UPDATE import_runs
             SET finished_at = ?3, status = ?4, created_count = ?5, closed_count = ?6,
                 unchanged_count = ?7, error = ?8
             WHERE workspace_id = ?1 AND id = ?2",
            params![
                workspace_id,
                id.storage_hex(),
                encode_ts(finished_at),
                status.as_str(),
                stats.created,
                stats.closed,
                stats.unchanged,
                error,
            ],
        )
        .map_err(store_err)?;
    if changed == 0 {
        return Err(LatticeError::not_found("import_run", id.to_string()));
    }
    Ok(())
}

pub fn get_run(
    conn: &Connection,
    workspace_id: &str,
    id: LatticeId,
) -> LatticeResult<Option<ImportRun>> {
    let row = conn
        .query_row(
            &format!("SELECT {RUN_COLUMNS} FROM import_runs WHERE workspace_id = ?1 AND id = ?2"),
            params![workspace_id, id.storage_hex()],
            row_to_run,
        )
        .optional()
        .map_err(store_err)?;
    row.map(decode_run).transpose()
}

/// Most recent first.
pub fn list_runs(
    conn: &Connection,
    workspace_id: &str,
    limit: usize,
    offset: usize,
) -> LatticeResult<Vec<ImportRun>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM import_runs
             WHERE workspace_id = ?1
             ORDER BY started_at DESC, id DESC
             LIMIT ?2 OFFSET ?3"
        ))
        .map_err(store_err)?;
    let rows = stmt
        .query_map(params![workspace_id, limit, offset], row_to_run)
        .map_err(store_err)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(decode_run(row.map_err(store_err)?)?);
    }
    Ok(out)
}
