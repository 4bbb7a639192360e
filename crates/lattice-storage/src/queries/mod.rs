//! Raw statement modules, one per vertex family. All functions take a
//! borrowed connection so they compose under the writer's transactions.

pub mod assertion_ops;
pub mod edge_ops;
pub mod entity_ops;
pub mod event_ops;
pub mod source_ops;
pub mod value_ops;

use chrono::{DateTime, Utc};

use lattice_core::errors::{LatticeError, LatticeResult, StoreError};
use lattice_core::ids::{IdKind, LatticeId};

/// Decode the store's datetime text into calendar time.
pub(crate) fn parse_ts(raw: &str) -> LatticeResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            LatticeError::Store(StoreError::Decode {
                message: format!("bad datetime {raw:?}: {e}"),
            })
        })
}

/// Unset and explicit null are the same logical null on read; the empty
/// string is a store quirk treated likewise.
pub(crate) fn opt_ts(raw: Option<String>) -> LatticeResult<Option<DateTime<Utc>>> {
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() || s == "null" => Ok(None),
        Some(s) => parse_ts(&s).map(Some),
    }
}

pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn decode_id(kind: IdKind, raw: &str) -> LatticeResult<LatticeId> {
    LatticeId::from_storage(kind, raw).map_err(|e| {
        LatticeError::Store(StoreError::Decode {
            message: format!("bad id {raw:?}: {e}"),
        })
    })
}

pub(crate) fn decode_opt_id(kind: IdKind, raw: Option<String>) -> LatticeResult<Option<LatticeId>> {
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => decode_id(kind, &s).map(Some),
    }
}
