//! Assertion rows: insert, open-interval lookups, closing, orphan sweep.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use lattice_core::errors::{LatticeError, LatticeResult, StoreError};
use lattice_core::ids::{IdKind, LatticeId};
use lattice_core::keys::AssertionKey;
use lattice_core::models::{AssertionRecord, Confidence, ObjectRef, SourceRef, SourceType};

use crate::store_err;

use super::{decode_id, decode_opt_id, encode_ts, opt_ts, parse_ts};

const COLUMNS: &str = "id, workspace_id, assertion_key, relationship_type, property_key, \
     raw_hash, normalized_hash, source_type, source_ref, source_id, import_run_id, \
     recorded_at, valid_from, valid_to, scenario_id, confidence, supersedes";

/// The open-interval predicate. Unset and explicit null are the same
/// logical null; the empty string is tolerated as a store quirk.
const OPEN: &str = "(valid_to IS NULL OR valid_to = '')";

struct RawRow {
    id: String,
    workspace_id: String,
    assertion_key: String,
    relationship_type: String,
    property_key: Option<String>,
    raw_hash: String,
    normalized_hash: String,
    source_type: String,
    source_ref: String,
    source_id: String,
    import_run_id: Option<String>,
    recorded_at: String,
    valid_from: String,
    valid_to: Option<String>,
    scenario_id: String,
    confidence: f64,
    supersedes: Option<String>,
}

fn row_to_raw(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        assertion_key: row.get(2)?,
        relationship_type: row.get(3)?,
        property_key: row.get(4)?,
        raw_hash: row.get(5)?,
        normalized_hash: row.get(6)?,
        source_type: row.get(7)?,
        source_ref: row.get(8)?,
        source_id: row.get(9)?,
        import_run_id: row.get(10)?,
        recorded_at: row.get(11)?,
        valid_from: row.get(12)?,
        valid_to: row.get(13)?,
        scenario_id: row.get(14)?,
        confidence: row.get(15)?,
        supersedes: row.get(16)?,
    })
}

fn decode_record(raw: RawRow) -> LatticeResult<AssertionRecord> {
    let source_type = SourceType::parse(&raw.source_type).ok_or_else(|| {
        LatticeError::Store(StoreError::Decode {
            message: format!("unknown source_type {:?}", raw.source_type),
        })
    })?;
    let source_ref: SourceRef = serde_json::from_str(&raw.source_ref).map_err(|e| {
        LatticeError::Store(StoreError::Decode {
            message: format!("bad source_ref: {e}"),
        })
    })?;
    Ok(AssertionRecord {
        id: decode_id(IdKind::Assertion, &raw.id)?,
        workspace_id: raw.workspace_id,
        assertion_key: AssertionKey::from_stored(raw.assertion_key),
        relationship_type: raw.relationship_type,
        property_key: raw.property_key,
        raw_hash: raw.raw_hash,
        normalized_hash: raw.normalized_hash,
        source_type,
        source_ref,
        source_id: decode_id(IdKind::Source, &raw.source_id)?,
        import_run_id: decode_opt_id(IdKind::ImportRun, raw.import_run_id)?,
        recorded_at: parse_ts(&raw.recorded_at)?,
        valid_from: parse_ts(&raw.valid_from)?,
        valid_to: opt_ts(raw.valid_to)?,
        scenario_id: raw.scenario_id,
        confidence: Confidence::new(raw.confidence),
        supersedes: decode_opt_id(IdKind::Assertion, raw.supersedes)?,
    })
}

fn collect(
    rows: impl Iterator<Item = rusqlite::Result<RawRow>>,
) -> LatticeResult<Vec<AssertionRecord>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(decode_record(row.map_err(store_err)?)?);
    }
    Ok(out)
}

pub fn insert_record(conn: &Connection, record: &AssertionRecord) -> LatticeResult<()> {
    let source_ref = serde_json::to_string(&record.source_ref).map_err(store_err)?;
    conn.execute(
        &format!(
            "INSERT INTO assertions ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            record.id.storage_hex(),
            record.workspace_id,
            record.assertion_key.as_str(),
            record.relationship_type,
            record.property_key,
            record.raw_hash,
            record.normalized_hash,
            record.source_type.as_str(),
            source_ref,
            record.source_id.storage_hex(),
            record.import_run_id.map(|id| id.storage_hex()),
            encode_ts(record.recorded_at),
            encode_ts(record.valid_from),
            record.valid_to.map(encode_ts),
            record.scenario_id,
            record.confidence.value(),
            record.supersedes.map(|id| id.storage_hex()),
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

/// Every open record for the key and scenario, any source.
pub fn open_for_key(
    conn: &Connection,
    workspace_id: &str,
    key: &AssertionKey,
    scenario_id: &str,
) -> LatticeResult<Vec<AssertionRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM assertions
             WHERE workspace_id = ?1 AND assertion_key = ?2 AND scenario_id = ?3 AND {OPEN}"
        ))
        .map_err(store_err)?;
    let rows = stmt
        .query_map(params![workspace_id, key.as_str(), scenario_id], row_to_raw)
        .map_err(store_err)?;
    collect(rows)
}

/// Open records whose subject `ASSERTED_REL` edge leaves the entity. All
/// scenarios; the resolution engine does scenario preference itself.
pub fn open_for_entity(
    conn: &Connection,
    workspace_id: &str,
    entity_id: LatticeId,
) -> LatticeResult<Vec<AssertionRecord>> {
    let qualified_columns = COLUMNS.replace("workspace_id", "a.workspace_id");
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {qualified_columns} FROM assertions a
             JOIN edges e ON e.edge_type = 'ASSERTED_REL' AND e.to_id = a.id
             WHERE e.from_id = ?1 AND a.workspace_id = ?2 AND {OPEN}"
        ))
        .map_err(store_err)?;
    let rows = stmt
        .query_map(params![entity_id.storage_hex(), workspace_id], row_to_raw)
        .map_err(store_err)?;
    collect(rows)
}

/// Distinct keys still open among assertions created by any import run of
/// the spec. Joins the runs to their ChangeEvent through `TRIGGERED_BY`,
/// then to assertions through `CREATED_ASSERTION`.
pub fn open_keys_by_spec(
    conn: &Connection,
    workspace_id: &str,
    spec_name: &str,
) -> LatticeResult<Vec<AssertionKey>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT DISTINCT a.assertion_key
             FROM import_runs r
             JOIN edges te ON te.edge_type = 'TRIGGERED_BY' AND te.to_id = r.id
             JOIN edges ce ON ce.edge_type = 'CREATED_ASSERTION' AND ce.from_id = te.from_id
             JOIN assertions a ON a.id = ce.to_id
             WHERE r.workspace_id = ?1 AND r.spec_name = ?2 AND {OPEN}"
        ))
        .map_err(store_err)?;
    let rows = stmt
        .query_map(params![workspace_id, spec_name], |row| {
            row.get::<_, String>(0)
        })
        .map_err(store_err)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(AssertionKey::from_stored(r.map_err(store_err)?));
    }
    Ok(out)
}

pub fn by_ids(
    conn: &Connection,
    workspace_id: &str,
    ids: &[LatticeId],
) -> LatticeResult<Vec<AssertionRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM assertions WHERE workspace_id = ?1 AND id = ?2"
        ))
        .map_err(store_err)?;
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let row = stmt
            .query_row(params![workspace_id, id.storage_hex()], row_to_raw)
            .optional()
            .map_err(store_err)?;
        if let Some(raw) = row {
            out.push(decode_record(raw)?);
        }
    }
    Ok(out)
}

/// Patch `valid_to` exactly once. Re-closing is a conflict; a missing row
/// is not found.
pub fn close(
    conn: &Connection,
    workspace_id: &str,
    id: LatticeId,
    valid_to: DateTime<Utc>,
) -> LatticeResult<()> {
    let changed = conn
        .execute(
            &format!(
                "UPDATE assertions SET valid_to = ?3
                 WHERE workspace_id = ?1 AND id = ?2 AND {OPEN}"
            ),
            params![workspace_id, id.storage_hex(), encode_ts(valid_to)],
        )
        .map_err(store_err)?;

    if changed == 1 {
        return Ok(());
    }

    let exists: bool = conn
        .prepare("SELECT 1 FROM assertions WHERE workspace_id = ?1 AND id = ?2")
        .and_then(|mut stmt| stmt.exists(params![workspace_id, id.storage_hex()]))
        .map_err(store_err)?;

    if exists {
        Err(StoreError::AlreadyClosed {
            id: id.to_string(),
        }
        .into())
    } else {
        Err(LatticeError::not_found("assertion", id.to_string()))
    }
}

/// The object endpoint of the claim: an entity for relationship assertions,
/// a property value for property assertions.
pub fn object_of(
    conn: &Connection,
    workspace_id: &str,
    assertion_id: LatticeId,
) -> LatticeResult<Option<ObjectRef>> {
    let targets = super::edge_ops::targets_of(conn, super::edge_ops::ASSERTED_REL, assertion_id)?;
    for hex in targets {
        let is_value: bool = conn
            .prepare("SELECT 1 FROM property_values WHERE workspace_id = ?1 AND id = ?2")
            .and_then(|mut stmt| stmt.exists(params![workspace_id, hex]))
            .map_err(store_err)?;
        if is_value {
            return Ok(Some(ObjectRef::PropertyValue(decode_id(
                IdKind::PropertyValue,
                &hex,
            )?)));
        }
        let is_entity: bool = conn
            .prepare("SELECT 1 FROM entities WHERE workspace_id = ?1 AND id = ?2")
            .and_then(|mut stmt| stmt.exists(params![workspace_id, hex]))
            .map_err(store_err)?;
        if is_entity {
            return Ok(Some(ObjectRef::Entity(decode_id(IdKind::Entity, &hex)?)));
        }
    }
    Ok(None)
}

/// The subject entity of the claim: the entity whose `ASSERTED_REL` edge
/// points at the assertion.
pub fn subject_of(
    conn: &Connection,
    workspace_id: &str,
    assertion_id: LatticeId,
) -> LatticeResult<Option<LatticeId>> {
    let mut stmt = conn
        .prepare(
            "SELECT e.from_id FROM edges e
             JOIN entities ent ON ent.id = e.from_id AND ent.workspace_id = ?1
             WHERE e.edge_type = 'ASSERTED_REL' AND e.to_id = ?2",
        )
        .map_err(store_err)?;
    let hex: Option<String> = stmt
        .query_row(params![workspace_id, assertion_id.storage_hex()], |row| {
            row.get(0)
        })
        .optional()
        .map_err(store_err)?;
    hex.map(|h| decode_id(IdKind::Entity, &h)).transpose()
}

/// Reap assertions no `CREATED_ASSERTION` edge reaches: leftovers of a
/// crashed run that never became visible. Their `ASSERTED_REL` edges go
/// with them.
pub fn sweep_orphans(conn: &Connection, workspace_id: &str) -> LatticeResult<u64> {
    conn.execute(
        "DELETE FROM edges
         WHERE edge_type = 'ASSERTED_REL'
           AND workspace_id = ?1
           AND (from_id IN (SELECT id FROM assertions WHERE workspace_id = ?1
                              AND id NOT IN (SELECT to_id FROM edges WHERE edge_type = 'CREATED_ASSERTION'))
             OR to_id IN (SELECT id FROM assertions WHERE workspace_id = ?1
                              AND id NOT IN (SELECT to_id FROM edges WHERE edge_type = 'CREATED_ASSERTION')))",
        params![workspace_id],
    )
    .map_err(store_err)?;

    let reaped = conn
        .execute(
            "DELETE FROM assertions
             WHERE workspace_id = ?1
               AND id NOT IN (SELECT to_id FROM edges WHERE edge_type = 'CREATED_ASSERTION')",
            params![workspace_id],
        )
        .map_err(store_err)?;
    Ok(reaped as u64)
}
