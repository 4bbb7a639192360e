//! Entity rows: insert, indexed lookup, search, convenience-property
//! rewrites.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension, Row};

use lattice_core::errors::{LatticeError, LatticeResult, StoreError};
use lattice_core::ids::{IdKind, LatticeId};
use lattice_core::models::Entity;
use lattice_core::traits::EntityFilter;

use crate::escape::escape_like;
use crate::store_err;

use super::{decode_id, encode_ts, parse_ts};

const COLUMNS: &str =
    "id, workspace_id, entity_type, primary_key, display_name, convenience_props, created_at";

fn row_to_entity(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn decode_entity(
    (id, workspace_id, entity_type, primary_key, display_name, props, created_at): (
        String,
        String,
        String,
        String,
        String,
        String,
        String,
    ),
) -> LatticeResult<Entity> {
    let convenience_props: BTreeMap<String, String> = serde_json::from_str(&props)
        .map_err(|e| {
            LatticeError::Store(StoreError::Decode {
                message: format!("bad convenience_props: {e}"),
            })
        })?;
    Ok(Entity {
        id: decode_id(IdKind::Entity, &id)?,
        workspace_id,
        entity_type,
        primary_key,
        display_name,
        convenience_props,
        created_at: parse_ts(&created_at)?,
    })
}

/// Fails with a duplicate conflict when the
/// `(workspace_id, entity_type, primary_key)` index already holds a row.
pub fn insert_entity(conn: &Connection, entity: &Entity) -> LatticeResult<()> {
    let props = serde_json::to_string(&entity.convenience_props).map_err(store_err)?;
    let result = conn.execute(
        "INSERT INTO entities (id, workspace_id, entity_type, primary_key, display_name, convenience_props, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entity.id.storage_hex(),
            entity.workspace_id,
            entity.entity_type,
            entity.primary_key,
            entity.display_name,
            props,
            encode_ts(entity.created_at),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) => {
            Err(StoreError::DuplicateEntity {
                workspace_id: entity.workspace_id.clone(),
                entity_type: entity.entity_type.clone(),
                primary_key: entity.primary_key.clone(),
            }
            .into())
        }
        Err(e) => Err(store_err(e)),
    }
}

/// O(1) via the composite unique index.
pub fn find_entity(
    conn: &Connection,
    workspace_id: &str,
    entity_type: &str,
    primary_key: &str,
) -> LatticeResult<Option<Entity>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM entities
                 WHERE workspace_id = ?1 AND entity_type = ?2 AND primary_key = ?3"
            ),
            params![workspace_id, entity_type, primary_key],
            row_to_entity,
        )
        .optional()
        .map_err(store_err)?;
    row.map(decode_entity).transpose()
}

pub fn get_entity(
    conn: &Connection,
    workspace_id: &str,
    id: LatticeId,
) -> LatticeResult<Option<Entity>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM entities WHERE workspace_id = ?1 AND id = ?2"),
            params![workspace_id, id.storage_hex()],
            row_to_entity,
        )
        .optional()
        .map_err(store_err)?;
    row.map(decode_entity).transpose()
}

pub fn entities_by_ids(
    conn: &Connection,
    workspace_id: &str,
    ids: &[LatticeId],
) -> LatticeResult<Vec<Entity>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM entities WHERE workspace_id = ?1 AND id = ?2"
        ))
        .map_err(store_err)?;
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let row = stmt
            .query_row(params![workspace_id, id.storage_hex()], row_to_entity)
            .optional()
            .map_err(store_err)?;
        if let Some(row) = row {
            out.push(decode_entity(row)?);
        }
    }
    Ok(out)
}

/// Index lookups only; no assertion traversal.
pub fn search_entities(
    conn: &Connection,
    workspace_id: &str,
    filter: &EntityFilter,
) -> LatticeResult<Vec<Entity>> {
    let mut sql = format!("SELECT {COLUMNS} FROM entities WHERE workspace_id = ?1");
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(workspace_id.to_string())];

    if let Some(entity_type) = &filter.entity_type {
        args.push(Box::new(entity_type.clone()));
        sql.push_str(&format!(" AND entity_type = ?{}", args.len()));
    }
    if let Some(primary_key) = &filter.primary_key {
        args.push(Box::new(primary_key.clone()));
        sql.push_str(&format!(" AND primary_key = ?{}", args.len()));
    }
    if let Some(q) = &filter.q {
        args.push(Box::new(format!("%{}%", escape_like(q))));
        sql.push_str(&format!(
            " AND display_name LIKE ?{} ESCAPE '\\'",
            args.len()
        ));
    }

    sql.push_str(&format!(
        " ORDER BY id LIMIT {} OFFSET {}",
        filter.limit, filter.offset
    ));

    let mut stmt = conn.prepare(&sql).map_err(store_err)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter().map(|b| b.as_ref())), row_to_entity)
        .map_err(store_err)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(decode_entity(row.map_err(store_err)?)?);
    }
    Ok(out)
}

/// Overwrite the derived property map. Derived data only; assertions stay
/// authoritative.
pub fn set_convenience_props(
    conn: &Connection,
    workspace_id: &str,
    entity_id: LatticeId,
    props: &BTreeMap<String, String>,
) -> LatticeResult<()> {
    let json = serde_json::to_string(props).map_err(store_err)?;
    conn.execute(
        "UPDATE entities SET convenience_props = ?3 WHERE workspace_id = ?1 AND id = ?2",
        params![workspace_id, entity_id.storage_hex(), json],
    )
    .map_err(store_err)?;
    Ok(())
}
