//! Hashing laws: parsing the same sheet twice yields identical digests,
//! and normalization is insensitive to whitespace/case noise in text
//! cells.

use proptest::prelude::*;

use lattice_ingest::workbook::{CellValue, Sheet};
use lattice_spec::mapping::{
    CellOrder, CellOrderPreset, DateFormat, NormalizationRules, NumberFormat,
    RawHashSerialization,
};

fn settings() -> RawHashSerialization {
    RawHashSerialization {
        cell_order: CellOrder::Preset(CellOrderPreset::ColumnOrder),
        delimiter: "|".to_string(),
        null_representation: String::new(),
        number_format: NumberFormat::AsDisplayed,
        date_format: DateFormat::AsDisplayed,
        include_formatting: false,
    }
}

fn rules() -> NormalizationRules {
    NormalizationRules {
        trim: true,
        collapse_whitespace: true,
        case_fold: true,
        null_tokens: vec![String::new(), "n/a".to_string()],
        decimal_places: None,
    }
}

fn sheet_of(cells: Vec<String>) -> Sheet {
    let columns = (0..cells.len()).map(|i| format!("c{i}")).collect();
    Sheet {
        name: "S".to_string(),
        columns,
        rows: vec![cells.iter().map(|c| CellValue::sniff(c)).collect()],
    }
}

proptest! {
    #[test]
    fn row_hashing_is_deterministic(cells in prop::collection::vec("[ -~]{0,12}", 1..6)) {
        let sheet = sheet_of(cells);
        let row = &sheet.rows[0];

        let a = lattice_ingest::hash::raw_row_hash(&sheet, row, &settings());
        let b = lattice_ingest::hash::raw_row_hash(&sheet, row, &settings());
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.len(), 64);

        let n1 = lattice_ingest::hash::normalized_row_hash(&sheet, row, &settings(), &rules());
        let n2 = lattice_ingest::hash::normalized_row_hash(&sheet, row, &settings(), &rules());
        prop_assert_eq!(n1, n2);
    }

    #[test]
    fn surrounding_whitespace_never_changes_the_normalized_hash(
        word in "[a-z]{1,10}",
        pad_left in 0usize..4,
        pad_right in 0usize..4,
    ) {
        let clean = sheet_of(vec![word.clone()]);
        let noisy = sheet_of(vec![format!(
            "{}{}{}",
            " ".repeat(pad_left),
            word.to_uppercase(),
            " ".repeat(pad_right),
        )]);

        let a = lattice_ingest::hash::normalized_row_hash(
            &clean, &clean.rows[0], &settings(), &rules());
        let b = lattice_ingest::hash::normalized_row_hash(
            &noisy, &noisy.rows[0], &settings(), &rules());
        prop_assert_eq!(a, b);
    }
}
