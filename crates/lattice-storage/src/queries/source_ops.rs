//! Registered sources: upsert keyed by name, authority ranks.

use std::collections::HashMap;

use rusqlite::{params, Connection, Row};

use lattice_core::errors::{LatticeError, LatticeResult, StoreError};
use lattice_core::ids::{IdKind, LatticeId};
use lattice_core::models::{Source, SourceType};

use crate::store_err;

use super::decode_id;

const COLUMNS: &str = "id, workspace_id, source_name, source_type, authority_domains, authority_rank";

#[allow(clippy::type_complexity)]
fn row_to_source(
    row: &Row<'_>,
) -> rusqlite::Result<(String, String, String, String, String, Option<i64>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_source(
    (id, workspace_id, source_name, source_type, domains, authority_rank): (
        String,
        String,
        String,
        String,
        String,
        Option<i64>,
    ),
) -> LatticeResult<Source> {
    let source_type = SourceType::parse(&source_type).ok_or_else(|| {
        LatticeError::Store(StoreError::Decode {
            message: format!("unknown source_type {source_type:?}"),
        })
    })?;
    let authority_domains: Vec<String> = serde_json::from_str(&domains).map_err(|e| {
        LatticeError::Store(StoreError::Decode {
            message: format!("bad authority_domains: {e}"),
        })
    })?;
    Ok(Source {
        id: decode_id(IdKind::Source, &id)?,
        workspace_id,
        source_name,
        source_type,
        authority_domains,
        authority_rank,
    })
}

/// Insert or update by `(workspace_id, source_name)`; returns the stored
/// row, keeping the existing id on update.
pub fn upsert(conn: &Connection, source: &Source) -> LatticeResult<Source> {
    let domains = serde_json::to_string(&source.authority_domains).map_err(store_err)?;
    conn.execute(
        &format!(
            "INSERT INTO sources ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (workspace_id, source_name) DO UPDATE SET
                 source_type = excluded.source_type,
                 authority_domains = excluded.authority_domains,
                 authority_rank = excluded.authority_rank"
        ),
        params![
            source.id.storage_hex(),
            source.workspace_id,
            source.source_name,
            source.source_type.as_str(),
            domains,
            source.authority_rank,
        ],
    )
    .map_err(store_err)?;

    let row = conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM sources WHERE workspace_id = ?1 AND source_name = ?2"
            ),
            params![source.workspace_id, source.source_name],
            row_to_source,
        )
        .map_err(store_err)?;
    decode_source(row)
}

/// `source_id → authority_rank` for every ranked source in the workspace.
pub fn ranks(conn: &Connection, workspace_id: &str) -> LatticeResult<HashMap<LatticeId, i64>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, authority_rank FROM sources
             WHERE workspace_id = ?1 AND authority_rank IS NOT NULL",
        )
        .map_err(store_err)?;
    let rows = stmt
        .query_map(params![workspace_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(store_err)?;
    let mut out = HashMap::new();
    for row in rows {
        let (hex, rank) = row.map_err(store_err)?;
        out.insert(decode_id(IdKind::Source, &hex)?, rank);
    }
    Ok(out)
}
