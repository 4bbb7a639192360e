//! Assertion keys — stable composite identifiers of conceptual facts.
//!
//! A key is content-addressed on the participating entities, never on the
//! asserted values, so the same fact observed by different sources at
//! different times shares one key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pseudo relationship type used by property assertions.
pub const HAS_PROPERTY: &str = "HAS_PROPERTY";

/// The base scenario every workspace starts from.
pub const BASE_SCENARIO: &str = "base";

/// Colon-separated composite key identifying one conceptual fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssertionKey(String);

impl AssertionKey {
    /// Key of a property fact:
    /// `{workspace_id}:{entity_type}:{primary_key}:prop:{property_key}`.
    pub fn property(
        workspace_id: &str,
        entity_type: &str,
        primary_key: &str,
        property_key: &str,
    ) -> Self {
        Self(format!(
            "{workspace_id}:{entity_type}:{primary_key}:prop:{property_key}"
        ))
    }

    /// Key of a relationship fact:
    /// `{workspace_id}:{from_type}:{from_pk}:{relationship_type}:{to_type}:{to_pk}`.
    pub fn relationship(
        workspace_id: &str,
        from_type: &str,
        from_pk: &str,
        relationship_type: &str,
        to_type: &str,
        to_pk: &str,
    ) -> Self {
        Self(format!(
            "{workspace_id}:{from_type}:{from_pk}:{relationship_type}:{to_type}:{to_pk}"
        ))
    }

    /// Wrap a key read back from the store.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssertionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_key_shape() {
        let k = AssertionKey::property("ws1", "Location", "1002", "region");
        assert_eq!(k.as_str(), "ws1:Location:1002:prop:region");
    }

    #[test]
    fn relationship_key_shape() {
        let k = AssertionKey::relationship("ws1", "Device", "d9", "CONNECTS_TO", "Location", "1002");
        assert_eq!(k.as_str(), "ws1:Device:d9:CONNECTS_TO:Location:1002");
    }

    #[test]
    fn same_fact_shares_key_across_sources() {
        let a = AssertionKey::property("ws1", "Connection", "c1", "speed");
        let b = AssertionKey::property("ws1", "Connection", "c1", "speed");
        assert_eq!(a, b);
    }
}
