//! Mapping specifications — how one tabular source becomes staged rows.
//!
//! The recognized fields are exhaustive; unknown fields fail parsing so a
//! typo cannot silently change ingest behavior. Hash settings carry no
//! implicit defaults: a spec that omits them does not parse, which keeps
//! every run reproducible from the spec text alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lattice_core::errors::{LatticeResult, SpecError};
use lattice_core::models::ValueType;

/// Which cells take part in row serialization, and in what order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellOrder {
    /// The sheet's physical column order.
    Preset(CellOrderPreset),
    /// An explicit column-name list.
    Columns(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellOrderPreset {
    ColumnOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    /// Preserve the displayed formatting.
    AsDisplayed,
    /// Shortest exact decimal rendering.
    Canonical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    AsDisplayed,
    Iso8601,
}

/// Input to `raw_hash`: exact, fully explicit serialization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawHashSerialization {
    pub cell_order: CellOrder,
    pub delimiter: String,
    /// Token standing in for an empty cell.
    pub null_representation: String,
    pub number_format: NumberFormat,
    pub date_format: DateFormat,
    pub include_formatting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDetectionMode {
    Strict,
    Normalized,
}

/// The deterministic, pure normalization applied per cell before the
/// normalized digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NormalizationRules {
    pub trim: bool,
    pub collapse_whitespace: bool,
    pub case_fold: bool,
    /// All of these map to one fixed null literal.
    pub null_tokens: Vec<String>,
    /// Fixed decimal places for numbers.
    pub decimal_places: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeDetection {
    pub mode: ChangeDetectionMode,
    #[serde(default)]
    pub normalization_rules: NormalizationRules,
}

/// Source column → property mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyMapping {
    pub column: String,
    /// Defaults to the column name.
    #[serde(default)]
    pub property_key: Option<String>,
    #[serde(default)]
    pub value_type: Option<ValueType>,
}

impl PropertyMapping {
    pub fn key(&self) -> &str {
        self.property_key.as_deref().unwrap_or(&self.column)
    }
}

/// One entity candidate per sheet row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityMapping {
    pub entity_type: String,
    /// Columns whose values form the primary key, joined with `:`.
    #[serde(default)]
    pub key_columns: Vec<String>,
    /// Format string composing the key from columns, e.g. `LOC-{loc_id}`.
    /// Takes precedence over `key_columns` when both appear.
    #[serde(default)]
    pub key_template: Option<String>,
    /// Column supplying `display_name`; falls back to the primary key.
    #[serde(default)]
    pub display_name_column: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipMapping {
    pub relationship_type: String,
    /// Alias of the subject entity within the same sheet.
    pub from_entity: String,
    /// Alias of the object entity within the same sheet.
    pub to_entity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetMapping {
    pub sheet_name: String,
    #[serde(default)]
    pub entities: BTreeMap<String, EntityMapping>,
    #[serde(default)]
    pub relationships: Vec<RelationshipMapping>,
}

/// Registration of the spec's source for authority resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceAuthority {
    pub source_name: String,
    #[serde(default)]
    pub authority_rank: Option<i64>,
    #[serde(default)]
    pub authority_domains: Vec<String>,
}

/// A complete mapping specification for one ingest source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingSpec {
    /// Unique; keys the "previous import by same spec" lookup.
    pub spec_name: String,
    pub workspace_id: String,
    pub sheets: Vec<SheetMapping>,
    pub raw_hash_serialization: RawHashSerialization,
    pub change_detection: ChangeDetection,
    pub source_authority: SourceAuthority,
}

impl MappingSpec {
    pub fn from_yaml(path: &str, yaml: &str) -> LatticeResult<Self> {
        let spec: MappingSpec = serde_yaml::from_str(yaml).map_err(|e| SpecError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(spec)
    }

    pub fn normalized_mode(&self) -> bool {
        self.change_detection.mode == ChangeDetectionMode::Normalized
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_locations_fixture() {
        let spec = MappingSpec::from_yaml("locations.yaml", fixtures::LOCATIONS_SPEC).unwrap();
        assert_eq!(spec.spec_name, "locations");
        assert!(spec.normalized_mode());
        assert_eq!(spec.sheets.len(), 1);
        let entity = &spec.sheets[0].entities["loc"];
        assert_eq!(entity.entity_type, "Location");
        assert_eq!(entity.properties[0].key(), "region");
        assert_eq!(
            spec.raw_hash_serialization.cell_order,
            CellOrder::Preset(CellOrderPreset::ColumnOrder)
        );
    }

    #[test]
    fn explicit_cell_order_list_parses() {
        let yaml = fixtures::LOCATIONS_SPEC.replace(
            "cell_order: column_order",
            "cell_order: [loc_id, region]",
        );
        let spec = MappingSpec::from_yaml("locations.yaml", &yaml).unwrap();
        assert_eq!(
            spec.raw_hash_serialization.cell_order,
            CellOrder::Columns(vec!["loc_id".to_string(), "region".to_string()])
        );
    }

    #[test]
    fn missing_hash_settings_fail_parsing() {
        // Strip the delimiter line: hash settings have no implicit defaults.
        let yaml = fixtures::LOCATIONS_SPEC.replace("  delimiter: \"|\"\n", "");
        assert!(MappingSpec::from_yaml("locations.yaml", &yaml).is_err());
    }

    #[test]
    fn unknown_fields_fail_parsing() {
        let yaml = format!("{}\nsurprise: true\n", fixtures::LOCATIONS_SPEC.trim_end());
        assert!(MappingSpec::from_yaml("locations.yaml", &yaml).is_err());
    }
}
