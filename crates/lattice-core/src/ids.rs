//! Time-sortable vertex identifiers.
//!
//! 128-bit UUIDv7 under the hood: the leading 48 bits are a millisecond
//! timestamp, so lexicographic order of the hex rendering matches creation
//! order. A process-wide `ContextV7` supplies the counter bits, which keeps
//! two same-millisecond mints distinct and in call order.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use uuid::timestamp::context::ContextV7;
use uuid::{Timestamp, Uuid};

static CLOCK: OnceLock<Mutex<ContextV7>> = OnceLock::new();

fn clock() -> &'static Mutex<ContextV7> {
    CLOCK.get_or_init(|| Mutex::new(ContextV7::new()))
}

/// Which vertex kind an identifier belongs to. Determines the display prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Entity,
    Assertion,
    ChangeEvent,
    ImportRun,
    PropertyValue,
    Source,
}

impl IdKind {
    /// Human-readable prefix, stripped before storage.
    pub fn prefix(self) -> &'static str {
        match self {
            IdKind::Entity => "entity_",
            IdKind::Assertion => "asrt_",
            IdKind::ChangeEvent => "evt_",
            IdKind::ImportRun => "imp_",
            IdKind::PropertyValue => "pv_",
            IdKind::Source => "src_",
        }
    }

    fn from_prefix(s: &str) -> Option<(IdKind, &str)> {
        for kind in [
            IdKind::Entity,
            IdKind::Assertion,
            IdKind::ChangeEvent,
            IdKind::ImportRun,
            IdKind::PropertyValue,
            IdKind::Source,
        ] {
            if let Some(rest) = s.strip_prefix(kind.prefix()) {
                return Some((kind, rest));
            }
        }
        None
    }
}

/// A globally unique, creation-time-sortable vertex identifier.
///
/// Stored as fixed-width 32-hex; rendered with its kind prefix for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LatticeId {
    kind: IdKind,
    value: Uuid,
}

impl LatticeId {
    /// Mint a fresh identifier. Same-millisecond mints differ and sort in
    /// call order within this process.
    pub fn mint(kind: IdKind) -> Self {
        let value = Uuid::new_v7(Timestamp::now(&*clock().lock().unwrap()));
        Self { kind, value }
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }

    /// The 32-hex storage form, no prefix.
    pub fn storage_hex(&self) -> String {
        self.value.simple().to_string()
    }

    /// Parse the storage form back under a known kind.
    pub fn from_storage(kind: IdKind, hex: &str) -> Result<Self, uuid::Error> {
        let value = Uuid::from_str(hex)?;
        Ok(Self { kind, value })
    }

    /// Parse either the prefixed display form or bare 32-hex (kind required
    /// for the bare form).
    pub fn parse(s: &str, fallback_kind: IdKind) -> Result<Self, uuid::Error> {
        match IdKind::from_prefix(s) {
            Some((kind, rest)) => Self::from_storage(kind, rest),
            None => Self::from_storage(fallback_kind, s),
        }
    }
}

impl fmt::Display for LatticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.value.simple())
    }
}

impl Serialize for LatticeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LatticeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match IdKind::from_prefix(&s) {
            Some((kind, rest)) => {
                LatticeId::from_storage(kind, rest).map_err(serde::de::Error::custom)
            }
            None => Err(serde::de::Error::custom(format!(
                "identifier missing kind prefix: {s}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_is_unique_and_ordered() {
        let a = LatticeId::mint(IdKind::Entity);
        let b = LatticeId::mint(IdKind::Entity);
        assert_ne!(a, b);
        assert!(a.storage_hex() < b.storage_hex(), "ids must sort in call order");
    }

    #[test]
    fn storage_form_is_32_hex() {
        let id = LatticeId::mint(IdKind::Assertion);
        let hex = id.storage_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let id = LatticeId::mint(IdKind::PropertyValue);
        let shown = id.to_string();
        assert!(shown.starts_with("pv_"));
        let back = LatticeId::parse(&shown, IdKind::Entity).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.kind(), IdKind::PropertyValue);
    }

    #[test]
    fn bare_hex_parses_with_fallback_kind() {
        let id = LatticeId::mint(IdKind::Source);
        let back = LatticeId::parse(&id.storage_hex(), IdKind::Source).unwrap();
        assert_eq!(back, id);
    }
}
