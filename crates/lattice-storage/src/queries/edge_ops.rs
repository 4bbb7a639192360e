//! Typed edge rows. Only four edge types exist; mutable structure is
//! modeled through assertion vertices, not direct edges.

use rusqlite::{params, Connection};

use lattice_core::errors::LatticeResult;
use lattice_core::ids::LatticeId;

use crate::store_err;

pub const ASSERTED_REL: &str = "ASSERTED_REL";
pub const TRIGGERED_BY: &str = "TRIGGERED_BY";
pub const CREATED_ASSERTION: &str = "CREATED_ASSERTION";
pub const CLOSED_ASSERTION: &str = "CLOSED_ASSERTION";

/// Idempotent: the `(edge_type, from, to)` triple is unique.
pub fn insert_edge(
    conn: &Connection,
    workspace_id: &str,
    edge_type: &str,
    from: LatticeId,
    to: LatticeId,
) -> LatticeResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO edges (workspace_id, edge_type, from_id, to_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            workspace_id,
            edge_type,
            from.storage_hex(),
            to.storage_hex()
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

/// Raw `to_id` hex values of edges leaving `from`.
pub fn targets_of(
    conn: &Connection,
    edge_type: &str,
    from: LatticeId,
) -> LatticeResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT to_id FROM edges WHERE edge_type = ?1 AND from_id = ?2")
        .map_err(store_err)?;
    let rows = stmt
        .query_map(params![edge_type, from.storage_hex()], |row| {
            row.get::<_, String>(0)
        })
        .map_err(store_err)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(store_err)?);
    }
    Ok(out)
}
