//! Typed property values.

use serde::{Deserialize, Serialize};

use crate::ids::LatticeId;

/// Declared type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Json,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(ValueType::String),
            "number" => Some(ValueType::Number),
            "boolean" => Some(ValueType::Boolean),
            "date" => Some(ValueType::Date),
            "json" => Some(ValueType::Json),
            _ => None,
        }
    }
}

/// Value object created only through property assertions. Two values are
/// the same iff `(property_key, value, value_type)` match; the store
/// deduplicates on that triple within a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub id: LatticeId,
    pub workspace_id: String,
    pub property_key: String,
    pub value: String,
    pub value_type: ValueType,
}
