//! v001: the six vertex tables and the typed edge table.
//!
//! `valid_to IS NULL` encodes the open interval. The ChangeEvent columns
//! `event_ts` and `descr` are the boundary renames of the reserved words
//! `timestamp` and `desc`.

use rusqlite::Connection;

use lattice_core::errors::LatticeResult;

use crate::store_err;

pub fn migrate(conn: &Connection) -> LatticeResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS entities (
            id                TEXT PRIMARY KEY,
            workspace_id      TEXT NOT NULL,
            entity_type       TEXT NOT NULL,
            primary_key       TEXT NOT NULL,
            display_name      TEXT NOT NULL,
            convenience_props TEXT NOT NULL DEFAULT '{}',
            created_at        TEXT NOT NULL,
            UNIQUE (workspace_id, entity_type, primary_key)
        );

        CREATE TABLE IF NOT EXISTS assertions (
            id                TEXT PRIMARY KEY,
            workspace_id      TEXT NOT NULL,
            assertion_key     TEXT NOT NULL,
            relationship_type TEXT NOT NULL,
            property_key      TEXT,
            raw_hash          TEXT NOT NULL,
            normalized_hash   TEXT NOT NULL,
            source_type       TEXT NOT NULL,
            source_ref        TEXT NOT NULL DEFAULT '{}',
            source_id         TEXT NOT NULL,
            import_run_id     TEXT,
            recorded_at       TEXT NOT NULL,
            valid_from        TEXT NOT NULL,
            valid_to          TEXT,
            scenario_id       TEXT NOT NULL DEFAULT 'base',
            confidence        REAL NOT NULL DEFAULT 1.0,
            supersedes        TEXT
        );

        CREATE TABLE IF NOT EXISTS property_values (
            id           TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            property_key TEXT NOT NULL,
            value        TEXT NOT NULL,
            value_type   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS change_events (
            id              TEXT PRIMARY KEY,
            workspace_id    TEXT NOT NULL,
            event_type      TEXT NOT NULL,
            event_ts        TEXT NOT NULL,
            actor_type      TEXT NOT NULL,
            actor_id        TEXT NOT NULL,
            created_count   INTEGER NOT NULL DEFAULT 0,
            closed_count    INTEGER NOT NULL DEFAULT 0,
            unchanged_count INTEGER NOT NULL DEFAULT 0,
            descr           TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS import_runs (
            id              TEXT PRIMARY KEY,
            workspace_id    TEXT NOT NULL,
            spec_name       TEXT NOT NULL,
            source_filename TEXT NOT NULL,
            started_at      TEXT NOT NULL,
            finished_at     TEXT,
            status          TEXT NOT NULL,
            created_count   INTEGER NOT NULL DEFAULT 0,
            closed_count    INTEGER NOT NULL DEFAULT 0,
            unchanged_count INTEGER NOT NULL DEFAULT 0,
            error           TEXT
        );

        CREATE TABLE IF NOT EXISTS sources (
            id                TEXT PRIMARY KEY,
            workspace_id      TEXT NOT NULL,
            source_name       TEXT NOT NULL,
            source_type       TEXT NOT NULL,
            authority_domains TEXT NOT NULL DEFAULT '[]',
            authority_rank    INTEGER,
            UNIQUE (workspace_id, source_name)
        );

        CREATE TABLE IF NOT EXISTS edges (
            edge_id      INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id TEXT NOT NULL,
            edge_type    TEXT NOT NULL,
            from_id      TEXT NOT NULL,
            to_id        TEXT NOT NULL,
            UNIQUE (edge_type, from_id, to_id)
        );
        ",
    )
    .map_err(store_err)?;
    Ok(())
}
