//! Staged rows — the parser's output and the orchestrator's input.
//!
//! Parsing never raises on bad rows: a missing key cell drops that entity
//! candidate (and any relationship depending on it), not the row.

use std::collections::BTreeMap;

use tracing::debug;

use lattice_core::errors::{IngestError, LatticeResult};
use lattice_core::models::ValueType;
use lattice_spec::mapping::{EntityMapping, MappingSpec, SheetMapping};
use lattice_spec::schema::DomainSchema;

use crate::hash;
use crate::workbook::{CellValue, Sheet, Workbook};

/// One property a row asserts about an entity.
#[derive(Debug, Clone)]
pub struct PropertyCandidate {
    pub property_key: String,
    pub value_type: ValueType,
    /// The value stored on the PropertyValue vertex: displayed text.
    pub value: String,
    /// Serialized per the spec's raw settings, for the raw content digest.
    pub raw_serialized: String,
    /// Normalized per the spec's rules, for the normalized content digest.
    pub normalized: String,
}

/// One entity a row sights.
#[derive(Debug, Clone)]
pub struct EntityCandidate {
    pub alias: String,
    pub entity_type: String,
    pub primary_key: String,
    pub display_name: String,
    pub properties: Vec<PropertyCandidate>,
}

/// One relationship a row claims between two aliased entities.
#[derive(Debug, Clone)]
pub struct RelationshipCandidate {
    pub relationship_type: String,
    pub from_alias: String,
    pub to_alias: String,
}

/// A parsed row with its provenance and both row-level digests.
#[derive(Debug, Clone)]
pub struct StagedRow {
    pub sheet: String,
    /// 1-based data-row index within the sheet.
    pub row_index: usize,
    pub raw_cells: BTreeMap<String, String>,
    pub normalized_cells: BTreeMap<String, String>,
    pub raw_hash: String,
    pub normalized_hash: String,
    pub entities: Vec<EntityCandidate>,
    pub relationships: Vec<RelationshipCandidate>,
}

fn compose_key(
    sheet: &Sheet,
    row: &[CellValue],
    mapping: &EntityMapping,
) -> Option<String> {
    if let Some(template) = &mapping.key_template {
        let mut key = template.clone();
        // Substitute every `{column}` occurrence; an empty substitution
        // invalidates the key.
        for column in &sheet.columns {
            let placeholder = format!("{{{column}}}");
            if key.contains(&placeholder) {
                let cell = sheet.cell(row, column)?;
                let text = cell.displayed().trim().to_string();
                if text.is_empty() {
                    return None;
                }
                key = key.replace(&placeholder, &text);
            }
        }
        if key.contains('{') {
            return None;
        }
        return Some(key);
    }

    let mut parts = Vec::with_capacity(mapping.key_columns.len());
    for column in &mapping.key_columns {
        let cell = sheet.cell(row, column)?;
        let text = cell.displayed().trim().to_string();
        if text.is_empty() {
            return None;
        }
        parts.push(text);
    }
    Some(parts.join(":"))
}

fn is_null_token(text: &str, spec: &MappingSpec) -> bool {
    text.is_empty()
        || spec
            .change_detection
            .normalization_rules
            .null_tokens
            .iter()
            .any(|t| t == text)
}

fn stage_sheet(
    sheet: &Sheet,
    mapping: &SheetMapping,
    spec: &MappingSpec,
    schema: &DomainSchema,
    out: &mut Vec<StagedRow>,
) {
    let settings = &spec.raw_hash_serialization;
    let rules = &spec.change_detection.normalization_rules;

    for (i, row) in sheet.rows.iter().enumerate() {
        let row_index = i + 1;

        let mut raw_cells = BTreeMap::new();
        let mut normalized_cells = BTreeMap::new();
        for column in &sheet.columns {
            let cell = sheet.cell(row, column).unwrap_or(crate::workbook::EMPTY_CELL);
            raw_cells.insert(column.clone(), hash::serialize_cell(cell, settings));
            normalized_cells.insert(column.clone(), hash::normalize_cell(cell, settings, rules));
        }

        let mut entities = Vec::new();
        for (alias, entity_mapping) in &mapping.entities {
            let Some(primary_key) = compose_key(sheet, row, entity_mapping) else {
                debug!(
                    sheet = %sheet.name,
                    row_index,
                    alias = %alias,
                    "dropping entity candidate: missing key cells"
                );
                continue;
            };

            let display_name = entity_mapping
                .display_name_column
                .as_ref()
                .and_then(|c| sheet.cell(row, c))
                .map(|cell| cell.displayed().trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| primary_key.clone());

            let mut properties = Vec::new();
            for prop in &entity_mapping.properties {
                let cell = sheet.cell(row, &prop.column).unwrap_or(crate::workbook::EMPTY_CELL);
                let raw_serialized = hash::serialize_cell(cell, settings);
                if cell.is_empty() || is_null_token(&raw_serialized, spec) {
                    continue;
                }
                let value_type = prop
                    .value_type
                    .or_else(|| schema.property_type(&entity_mapping.entity_type, prop.key()))
                    .unwrap_or_default();
                properties.push(PropertyCandidate {
                    property_key: prop.key().to_string(),
                    value_type,
                    value: cell.displayed().into_owned(),
                    raw_serialized,
                    normalized: hash::normalize_cell(cell, settings, rules),
                });
            }

            entities.push(EntityCandidate {
                alias: alias.clone(),
                entity_type: entity_mapping.entity_type.clone(),
                primary_key,
                display_name,
                properties,
            });
        }

        let relationships = mapping
            .relationships
            .iter()
            .filter(|rel| {
                let have = |alias: &str| entities.iter().any(|e| e.alias == alias);
                let ok = have(&rel.from_entity) && have(&rel.to_entity);
                if !ok {
                    debug!(
                        sheet = %sheet.name,
                        row_index,
                        relationship_type = %rel.relationship_type,
                        "dropping relationship candidate: endpoint candidate missing"
                    );
                }
                ok
            })
            .map(|rel| RelationshipCandidate {
                relationship_type: rel.relationship_type.clone(),
                from_alias: rel.from_entity.clone(),
                to_alias: rel.to_entity.clone(),
            })
            .collect();

        out.push(StagedRow {
            sheet: sheet.name.clone(),
            row_index,
            raw_cells,
            normalized_cells,
            raw_hash: hash::raw_row_hash(sheet, row, settings),
            normalized_hash: hash::normalized_row_hash(sheet, row, settings, rules),
            entities,
            relationships,
        });
    }
}

/// Apply the mapping spec to an opened workbook, producing staged rows for
/// every declared sheet.
pub fn stage_rows(
    workbook: &Workbook,
    spec: &MappingSpec,
    schema: &DomainSchema,
) -> LatticeResult<Vec<StagedRow>> {
    let mut out = Vec::new();
    for mapping in &spec.sheets {
        let sheet = workbook.sheet(&mapping.sheet_name).ok_or_else(|| {
            IngestError::MissingSheet {
                sheet: mapping.sheet_name.clone(),
            }
        })?;
        stage_sheet(sheet, mapping, spec, schema, &mut out);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::Sheet;
    use lattice_spec::MappingSpec;

    const SPEC: &str = r#"
spec_name: sites
workspace_id: ws1
sheets:
  - sheet_name: Sites
    entities:
      site:
        entity_type: Location
        key_columns: [loc_id]
        display_name_column: name
        properties:
          - column: region
      owner:
        entity_type: Party
        key_columns: [owner_id]
    relationships:
      - relationship_type: OWNED_BY
        from_entity: site
        to_entity: owner
raw_hash_serialization:
  cell_order: column_order
  delimiter: "|"
  null_representation: ""
  number_format: as_displayed
  date_format: as_displayed
  include_formatting: false
change_detection:
  mode: normalized
  normalization_rules:
    trim: true
    collapse_whitespace: true
    case_fold: true
    null_tokens: ["", "n/a"]
source_authority:
  source_name: sites-sheet
  authority_rank: 1
"#;

    const SCHEMA: &str = r#"
workspace_id: ws1
entity_types:
  Location:
    properties:
      region: { value_type: string }
  Party: {}
relationship_types:
  OWNED_BY: { from: Location, to: Party }
"#;

    fn sheet(rows: &[&[&str]]) -> Sheet {
        Sheet {
            name: "Sites".to_string(),
            columns: vec![
                "loc_id".to_string(),
                "name".to_string(),
                "region".to_string(),
                "owner_id".to_string(),
            ],
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| CellValue::sniff(c)).collect())
                .collect(),
        }
    }

    fn fixtures() -> (MappingSpec, DomainSchema) {
        (
            MappingSpec::from_yaml("sites.yaml", SPEC).unwrap(),
            DomainSchema::from_yaml(SCHEMA).unwrap(),
        )
    }

    #[test]
    fn stages_entities_properties_and_relationships() {
        let (spec, schema) = fixtures();
        let wb = Workbook::from_sheets(
            "sites.csv",
            vec![sheet(&[&["1001", "East Hub", "east", "p7"]])],
        );
        let rows = stage_rows(&wb, &spec, &schema).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.row_index, 1);
        assert_eq!(row.entities.len(), 2);

        let site = row.entities.iter().find(|e| e.alias == "site").unwrap();
        assert_eq!(site.primary_key, "1001");
        assert_eq!(site.display_name, "East Hub");
        assert_eq!(site.properties.len(), 1);
        assert_eq!(site.properties[0].value, "east");

        assert_eq!(row.relationships.len(), 1);
    }

    #[test]
    fn missing_key_cell_drops_candidate_not_row() {
        let (spec, schema) = fixtures();
        let wb = Workbook::from_sheets(
            "sites.csv",
            vec![sheet(&[&["", "Nameless", "west", "p7"]])],
        );
        let rows = stage_rows(&wb, &spec, &schema).unwrap();
        assert_eq!(rows.len(), 1, "the row itself survives");
        // Site candidate dropped, owner candidate survives, relationship
        // loses an endpoint and is dropped too.
        assert_eq!(rows[0].entities.len(), 1);
        assert_eq!(rows[0].entities[0].alias, "owner");
        assert!(rows[0].relationships.is_empty());
    }

    #[test]
    fn null_token_cells_produce_no_property_candidate() {
        let (spec, schema) = fixtures();
        let wb = Workbook::from_sheets(
            "sites.csv",
            vec![sheet(&[&["1001", "Hub", "n/a", "p7"]])],
        );
        let rows = stage_rows(&wb, &spec, &schema).unwrap();
        let site = rows[0].entities.iter().find(|e| e.alias == "site").unwrap();
        assert!(site.properties.is_empty());
    }

    #[test]
    fn missing_declared_sheet_is_an_error() {
        let (spec, schema) = fixtures();
        let wb = Workbook::from_sheets("other.csv", vec![]);
        assert!(stage_rows(&wb, &spec, &schema).is_err());
    }

    #[test]
    fn key_template_composes_from_columns() {
        let (mut spec, schema) = fixtures();
        let site = spec.sheets[0].entities.get_mut("site").unwrap();
        site.key_columns = vec![];
        site.key_template = Some("LOC-{loc_id}".to_string());

        let wb = Workbook::from_sheets(
            "sites.csv",
            vec![sheet(&[&["1001", "Hub", "east", "p7"]])],
        );
        let rows = stage_rows(&wb, &spec, &schema).unwrap();
        let site = rows[0].entities.iter().find(|e| e.alias == "site").unwrap();
        assert_eq!(site.primary_key, "LOC-1001");
    }
}
