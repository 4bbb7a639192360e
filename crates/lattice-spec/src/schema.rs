//! Domain schemas — what a workspace may contain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lattice_core::errors::{LatticeResult, SpecError};
use lattice_core::models::ValueType;

/// Declared property of an entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertySchema {
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityTypeSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Declared relationship type with its endpoint entity types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipTypeSchema {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Per-workspace domain schema. Loaded once at startup and on explicit
/// reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainSchema {
    pub workspace_id: String,
    #[serde(default)]
    pub entity_types: BTreeMap<String, EntityTypeSchema>,
    #[serde(default)]
    pub relationship_types: BTreeMap<String, RelationshipTypeSchema>,
}

impl DomainSchema {
    pub fn from_yaml(yaml: &str) -> LatticeResult<Self> {
        let schema: DomainSchema = serde_yaml::from_str(yaml).map_err(|e| SpecError::Parse {
            path: "<schema>".to_string(),
            reason: e.to_string(),
        })?;
        Ok(schema)
    }

    pub fn has_entity_type(&self, name: &str) -> bool {
        self.entity_types.contains_key(name)
    }

    pub fn relationship_type(&self, name: &str) -> Option<&RelationshipTypeSchema> {
        self.relationship_types.get(name)
    }

    /// Declared value type of a property, if the schema declares it.
    pub fn property_type(&self, entity_type: &str, property_key: &str) -> Option<ValueType> {
        self.entity_types
            .get(entity_type)
            .and_then(|e| e.properties.get(property_key))
            .map(|p| p.value_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
workspace_id: ws1
entity_types:
  Location:
    properties:
      region: { value_type: string }
      capacity: { value_type: number }
  Device:
    properties: {}
relationship_types:
  INSTALLED_AT: { from: Device, to: Location }
"#;

    #[test]
    fn parses_and_answers_lookups() {
        let schema = DomainSchema::from_yaml(SCHEMA).unwrap();
        assert!(schema.has_entity_type("Location"));
        assert!(!schema.has_entity_type("Cable"));
        assert_eq!(
            schema.property_type("Location", "capacity"),
            Some(ValueType::Number)
        );
        let rel = schema.relationship_type("INSTALLED_AT").unwrap();
        assert_eq!(rel.from, "Device");
        assert_eq!(rel.to, "Location");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let bad = "workspace_id: ws1\nextra_field: 1\n";
        assert!(DomainSchema::from_yaml(bad).is_err());
    }
}
