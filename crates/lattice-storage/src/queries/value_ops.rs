//! Property-value rows. One vertex per creating assertion; equality of the
//! `(property_key, value, value_type)` triple is the identity test for
//! readers.

use rusqlite::{params, Connection, OptionalExtension, Row};

use lattice_core::errors::{LatticeError, LatticeResult, StoreError};
use lattice_core::ids::{IdKind, LatticeId};
use lattice_core::models::{PropertyValue, ValueType};

use crate::store_err;

use super::decode_id;

const COLUMNS: &str = "id, workspace_id, property_key, value, value_type";

fn row_to_value(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode_value(
    (id, workspace_id, property_key, value, value_type): (String, String, String, String, String),
) -> LatticeResult<PropertyValue> {
    let value_type = ValueType::parse(&value_type).ok_or_else(|| {
        LatticeError::Store(StoreError::Decode {
            message: format!("unknown value_type {value_type:?}"),
        })
    })?;
    Ok(PropertyValue {
        id: decode_id(IdKind::PropertyValue, &id)?,
        workspace_id,
        property_key,
        value,
        value_type,
    })
}

pub fn insert_value(conn: &Connection, value: &PropertyValue) -> LatticeResult<()> {
    conn.execute(
        &format!("INSERT INTO property_values ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
        params![
            value.id.storage_hex(),
            value.workspace_id,
            value.property_key,
            value.value,
            value.value_type.as_str(),
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn by_ids(
    conn: &Connection,
    workspace_id: &str,
    ids: &[LatticeId],
) -> LatticeResult<Vec<PropertyValue>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM property_values WHERE workspace_id = ?1 AND id = ?2"
        ))
        .map_err(store_err)?;
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let row = stmt
            .query_row(params![workspace_id, id.storage_hex()], row_to_value)
            .optional()
            .map_err(store_err)?;
        if let Some(raw) = row {
            out.push(decode_value(raw)?);
        }
    }
    Ok(out)
}
