//! Canonical serialization and digests.
//!
//! Two digests are always produced: `raw_hash` over the exact displayed
//! cell text per the spec's serialization block, and `normalized_hash`
//! over the same cells after the spec's normalization rules. Both are pure
//! functions of the row and the spec, so re-hashing an unchanged source is
//! byte-identical.

use sha2::{Digest, Sha256};

use lattice_spec::mapping::{
    CellOrder, DateFormat, NormalizationRules, NumberFormat, RawHashSerialization,
};

use crate::workbook::{CellValue, Sheet};

/// Every configured null token collapses to this literal under
/// normalization.
pub const NULL_LITERAL: &str = "null";

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// One cell's exact string form under the raw serialization settings.
pub fn serialize_cell(cell: &CellValue, settings: &RawHashSerialization) -> String {
    match cell {
        CellValue::Empty => settings.null_representation.clone(),
        CellValue::Text(s) => s.clone(),
        CellValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
        CellValue::Number { value, displayed } => match settings.number_format {
            NumberFormat::AsDisplayed => displayed.clone(),
            NumberFormat::Canonical => format!("{value}"),
        },
        CellValue::Date { date, displayed } => match settings.date_format {
            DateFormat::AsDisplayed => displayed.clone(),
            DateFormat::Iso8601 => date.format("%Y-%m-%d").to_string(),
        },
    }
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// One cell's normalized string form. Deterministic and pure: typed cells
/// normalize from their typed value, text normalizes per the string rules,
/// and null tokens all land on [`NULL_LITERAL`].
pub fn normalize_cell(
    cell: &CellValue,
    settings: &RawHashSerialization,
    rules: &NormalizationRules,
) -> String {
    match cell {
        CellValue::Empty => NULL_LITERAL.to_string(),
        CellValue::Date { date, .. } => date.format("%Y-%m-%d").to_string(),
        CellValue::Number { value, .. } => match rules.decimal_places {
            Some(dp) => format!("{value:.prec$}", prec = dp as usize),
            None => format!("{value}"),
        },
        CellValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
        CellValue::Text(_) => {
            let mut s = serialize_cell(cell, settings);
            if rules.trim {
                s = s.trim().to_string();
            }
            if rules.collapse_whitespace {
                s = collapse_whitespace(&s);
            }
            if rules.case_fold {
                s = s.to_lowercase();
            }
            if rules.null_tokens.iter().any(|t| t == &s) {
                s = NULL_LITERAL.to_string();
            }
            s
        }
    }
}

/// The cells taking part in row serialization, in declared order. A named
/// column absent from the sheet contributes a null cell.
fn select_cells<'a>(sheet: &'a Sheet, row: &'a [CellValue], order: &CellOrder) -> Vec<&'a CellValue> {
    match order {
        CellOrder::Preset(_) => row.iter().collect(),
        CellOrder::Columns(names) => names
            .iter()
            .map(|name| sheet.cell(row, name).unwrap_or(crate::workbook::EMPTY_CELL))
            .collect(),
    }
}

/// Canonical row serialization: select, stringify, join with the
/// delimiter.
pub fn canonical_row(sheet: &Sheet, row: &[CellValue], settings: &RawHashSerialization) -> String {
    select_cells(sheet, row, &settings.cell_order)
        .iter()
        .map(|cell| serialize_cell(cell, settings))
        .collect::<Vec<_>>()
        .join(&settings.delimiter)
}

pub fn raw_row_hash(sheet: &Sheet, row: &[CellValue], settings: &RawHashSerialization) -> String {
    sha256_hex(canonical_row(sheet, row, settings).as_bytes())
}

pub fn normalized_row(
    sheet: &Sheet,
    row: &[CellValue],
    settings: &RawHashSerialization,
    rules: &NormalizationRules,
) -> String {
    select_cells(sheet, row, &settings.cell_order)
        .iter()
        .map(|cell| normalize_cell(cell, settings, rules))
        .collect::<Vec<_>>()
        .join(&settings.delimiter)
}

pub fn normalized_row_hash(
    sheet: &Sheet,
    row: &[CellValue],
    settings: &RawHashSerialization,
    rules: &NormalizationRules,
) -> String {
    sha256_hex(normalized_row(sheet, row, settings, rules).as_bytes())
}

/// Content digest of one property candidate. Hashing the candidate's own
/// content keeps per-assertion change detection isolated from per-row
/// noise.
pub fn property_content_hash(property_key: &str, serialized_value: &str) -> String {
    sha256_hex(format!("{property_key}={serialized_value}").as_bytes())
}

/// Content digest of one relationship candidate: the endpoint identities.
/// Formatting never enters, so raw and normalized digests coincide.
pub fn relationship_content_hash(
    from_type: &str,
    from_pk: &str,
    relationship_type: &str,
    to_type: &str,
    to_pk: &str,
) -> String {
    sha256_hex(format!("{from_type}:{from_pk}:{relationship_type}:{to_type}:{to_pk}").as_bytes())
}
