//! Structural validation of a mapping spec against its workspace schema.

use lattice_core::errors::{LatticeResult, SpecError};

use crate::mapping::MappingSpec;
use crate::schema::DomainSchema;

/// Reject spec references the schema does not declare. Runs at load time,
/// before any ingest work touches the store.
pub fn validate_spec(spec: &MappingSpec, schema: &DomainSchema) -> LatticeResult<()> {
    let spec_name = &spec.spec_name;

    if spec.workspace_id != schema.workspace_id {
        return Err(SpecError::Invalid {
            spec_name: spec_name.clone(),
            reason: format!(
                "spec targets workspace {} but schema is for {}",
                spec.workspace_id, schema.workspace_id
            ),
        }
        .into());
    }

    for sheet in &spec.sheets {
        for (alias, entity) in &sheet.entities {
            if !schema.has_entity_type(&entity.entity_type) {
                return Err(SpecError::UnknownEntityType {
                    spec_name: spec_name.clone(),
                    entity_type: entity.entity_type.clone(),
                }
                .into());
            }
            if entity.key_columns.is_empty() && entity.key_template.is_none() {
                return Err(SpecError::EmptyKeyColumns {
                    spec_name: spec_name.clone(),
                    alias: alias.clone(),
                }
                .into());
            }
            for prop in &entity.properties {
                if schema.property_type(&entity.entity_type, prop.key()).is_none() {
                    return Err(SpecError::Invalid {
                        spec_name: spec_name.clone(),
                        reason: format!(
                            "property {} not declared on entity type {}",
                            prop.key(),
                            entity.entity_type
                        ),
                    }
                    .into());
                }
            }
        }

        for rel in &sheet.relationships {
            let declared = schema.relationship_type(&rel.relationship_type).ok_or_else(|| {
                SpecError::UnknownRelationshipType {
                    spec_name: spec_name.clone(),
                    relationship_type: rel.relationship_type.clone(),
                }
            })?;

            for (side, alias) in [("from", &rel.from_entity), ("to", &rel.to_entity)] {
                let entity = sheet.entities.get(alias).ok_or_else(|| SpecError::UnknownAlias {
                    spec_name: spec_name.clone(),
                    alias: alias.clone(),
                })?;
                let expected = if side == "from" {
                    &declared.from
                } else {
                    &declared.to
                };
                if &entity.entity_type != expected {
                    return Err(SpecError::Invalid {
                        spec_name: spec_name.clone(),
                        reason: format!(
                            "relationship {} expects {side} type {expected}, alias {alias} is {}",
                            rel.relationship_type, entity.entity_type
                        ),
                    }
                    .into());
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::fixtures::LOCATIONS_SPEC;
    use crate::schema::DomainSchema;

    const SCHEMA: &str = r#"
workspace_id: ws1
entity_types:
  Location:
    properties:
      region: { value_type: string }
  Device:
    properties: {}
relationship_types:
  INSTALLED_AT: { from: Device, to: Location }
"#;

    fn spec() -> MappingSpec {
        MappingSpec::from_yaml("locations.yaml", LOCATIONS_SPEC).unwrap()
    }

    #[test]
    fn valid_spec_passes() {
        let schema = DomainSchema::from_yaml(SCHEMA).unwrap();
        validate_spec(&spec(), &schema).unwrap();
    }

    #[test]
    fn unknown_entity_type_is_rejected() {
        let schema = DomainSchema::from_yaml(SCHEMA).unwrap();
        let mut spec = spec();
        spec.sheets[0]
            .entities
            .get_mut("loc")
            .unwrap()
            .entity_type = "Cable".to_string();
        let err = validate_spec(&spec, &schema).unwrap_err();
        assert!(err.to_string().contains("unknown entity type"));
    }

    #[test]
    fn undeclared_property_is_rejected() {
        let schema = DomainSchema::from_yaml(SCHEMA).unwrap();
        let mut spec = spec();
        spec.sheets[0]
            .entities
            .get_mut("loc")
            .unwrap()
            .properties[0]
            .column = "altitude".to_string();
        assert!(validate_spec(&spec, &schema).is_err());
    }

    #[test]
    fn missing_key_columns_are_rejected() {
        let schema = DomainSchema::from_yaml(SCHEMA).unwrap();
        let mut spec = spec();
        spec.sheets[0].entities.get_mut("loc").unwrap().key_columns = vec![];
        let err = validate_spec(&spec, &schema).unwrap_err();
        assert!(err.to_string().contains("no key columns"));
    }

    #[test]
    fn relationship_alias_and_types_are_checked() {
        let schema = DomainSchema::from_yaml(SCHEMA).unwrap();
        let mut spec = spec();
        spec.sheets[0].relationships.push(crate::mapping::RelationshipMapping {
            relationship_type: "INSTALLED_AT".to_string(),
            from_entity: "dev".to_string(),
            to_entity: "loc".to_string(),
        });
        // Alias `dev` is not declared on the sheet.
        assert!(validate_spec(&spec, &schema).is_err());
    }
}
