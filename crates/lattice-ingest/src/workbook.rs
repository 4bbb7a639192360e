//! Tabular sources as typed sheets.
//!
//! A workbook is either a single CSV file (one sheet named after the file
//! stem) or a directory of `<sheet>.csv` files. Cells arrive as computed
//! values: a leading `=` is ordinary text here, never a formula.

use std::borrow::Cow;
use std::path::Path;

use chrono::NaiveDate;

use lattice_core::errors::{IngestError, LatticeResult};

/// Shared stand-in for absent cells.
pub(crate) const EMPTY_CELL: &CellValue = &CellValue::Empty;

/// A typed cell plus the text it displayed as in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number { value: f64, displayed: String },
    Boolean(bool),
    Date { date: NaiveDate, displayed: String },
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The string the source displayed. Booleans serialize as lowercase
    /// literals.
    pub fn displayed(&self) -> Cow<'_, str> {
        match self {
            CellValue::Empty => Cow::Borrowed(""),
            CellValue::Text(s) => Cow::Borrowed(s),
            CellValue::Number { displayed, .. } => Cow::Borrowed(displayed),
            CellValue::Boolean(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            CellValue::Date { displayed, .. } => Cow::Borrowed(displayed),
        }
    }

    /// Type a raw field by syntax. Dates accept ISO and the common
    /// slash-separated US form; the displayed text is kept either way.
    pub fn sniff(raw: &str) -> CellValue {
        if raw.is_empty() {
            return CellValue::Empty;
        }
        match raw.to_ascii_lowercase().as_str() {
            "true" => return CellValue::Boolean(true),
            "false" => return CellValue::Boolean(false),
            _ => {}
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return CellValue::Date {
                date,
                displayed: raw.to_string(),
            };
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
            return CellValue::Date {
                date,
                displayed: raw.to_string(),
            };
        }
        if let Ok(value) = raw.trim().parse::<f64>() {
            if value.is_finite() {
                return CellValue::Number {
                    value,
                    displayed: raw.to_string(),
                };
            }
        }
        CellValue::Text(raw.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn cell<'a>(&self, row: &'a [CellValue], column: &str) -> Option<&'a CellValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        row.get(idx)
    }
}

#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    pub filename: String,
}

impl Workbook {
    /// Open a CSV file or a directory of CSV sheets.
    pub fn open(path: impl AsRef<Path>) -> LatticeResult<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let unreadable = |reason: String| IngestError::SourceUnreadable {
            path: path.display().to_string(),
            reason,
        };

        let mut sheets = Vec::new();
        if path.is_dir() {
            let mut files: Vec<_> = std::fs::read_dir(path)
                .map_err(|e| unreadable(e.to_string()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
                .collect();
            files.sort();
            for file in files {
                sheets.push(Self::read_sheet(&file)?);
            }
        } else {
            sheets.push(Self::read_sheet(path)?);
        }

        Ok(Self { sheets, filename })
    }

    fn read_sheet(path: &Path) -> LatticeResult<Sheet> {
        let name = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| IngestError::SourceUnreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| IngestError::SourceUnreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| IngestError::SourceUnreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let mut row: Vec<CellValue> =
                record.iter().map(CellValue::sniff).collect();
            // Short rows pad out with empties so column lookups stay valid.
            row.resize(columns.len(), CellValue::Empty);
            rows.push(row);
        }

        Ok(Sheet {
            name,
            columns,
            rows,
        })
    }

    /// In-memory construction, used by tests and API-fed imports.
    pub fn from_sheets(filename: impl Into<String>, sheets: Vec<Sheet>) -> Self {
        Self {
            sheets,
            filename: filename.into(),
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffing_types_cells() {
        assert_eq!(CellValue::sniff(""), CellValue::Empty);
        assert_eq!(CellValue::sniff("TRUE"), CellValue::Boolean(true));
        assert!(matches!(
            CellValue::sniff("3.50"),
            CellValue::Number { value, ref displayed } if value == 3.5 && displayed == "3.50"
        ));
        assert!(matches!(CellValue::sniff("2024-03-01"), CellValue::Date { .. }));
        assert!(matches!(CellValue::sniff("east"), CellValue::Text(_)));
        // Formulas arrive pre-computed; a stray `=` is just text.
        assert!(matches!(CellValue::sniff("=SUM(A1)"), CellValue::Text(_)));
    }

    #[test]
    fn displayed_preserves_source_text() {
        assert_eq!(CellValue::sniff("3.50").displayed(), "3.50");
        assert_eq!(CellValue::sniff("FALSE").displayed(), "false");
        assert_eq!(CellValue::sniff("01/15/2024").displayed(), "01/15/2024");
    }

    #[test]
    fn reads_a_csv_file_as_one_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Locations.csv");
        std::fs::write(&path, "loc_id,region\n1001,east\n1002,west\n").unwrap();

        let wb = Workbook::open(&path).unwrap();
        let sheet = wb.sheet("Locations").expect("sheet named after file stem");
        assert_eq!(sheet.columns, vec!["loc_id", "region"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.cell(&sheet.rows[1], "region").unwrap().displayed(), "west");
    }

    #[test]
    fn short_rows_pad_with_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.csv");
        std::fs::write(&path, "a,b,c\n1,2\n").unwrap();
        let wb = Workbook::open(&path).unwrap();
        let sheet = wb.sheet("s").unwrap();
        assert_eq!(sheet.rows[0].len(), 3);
        assert!(sheet.rows[0][2].is_empty());
    }
}
