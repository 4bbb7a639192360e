//! Store-native quoting and reserved-word handling.
//!
//! User-supplied values are always bound as parameters; these helpers cover
//! the places where statement text itself is assembled: identifier
//! quoting, `LIKE` patterns, and the column renames for names that collide
//! with the store's reserved words.

use lattice_core::errors::{LatticeError, StoreError};

/// Reserved words we refuse as raw identifiers. `timestamp` and `desc` are
/// the two that bite in practice; they get fixed renames at this boundary.
const RESERVED: &[&str] = &[
    "timestamp", "desc", "asc", "order", "group", "index", "table", "select", "where", "from",
    "join", "values", "transaction", "default", "check", "references",
];

pub fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED.iter().any(|w| *w == lower)
}

/// The column name actually used in store statements for a logical field.
/// Reserved names get their fixed store-side rename; everything else passes
/// through.
pub fn boundary_column(logical: &str) -> &str {
    match logical {
        "timestamp" => "event_ts",
        "desc" => "descr",
        other => other,
    }
}

/// Double-quote an identifier for interpolation into statement text.
/// Rejects embedded quotes, NUL, and reserved words that have no rename.
pub fn quote_ident(name: &str) -> Result<String, LatticeError> {
    if name.is_empty() || name.contains('"') || name.contains('\0') {
        return Err(LatticeError::Store(StoreError::backend(format!(
            "unquotable identifier: {name:?}"
        ))));
    }
    let name = boundary_column(name);
    if is_reserved(name) {
        return Err(LatticeError::Store(StoreError::backend(format!(
            "identifier collides with reserved word: {name}"
        ))));
    }
    Ok(format!("\"{name}\""))
}

/// Escape `%`, `_`, and the escape character itself for a
/// `LIKE ? ESCAPE '\'` pattern.
pub fn escape_like(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_are_renamed_at_the_boundary() {
        assert_eq!(boundary_column("timestamp"), "event_ts");
        assert_eq!(boundary_column("desc"), "descr");
        assert_eq!(boundary_column("actor_id"), "actor_id");
    }

    #[test]
    fn quote_ident_rejects_injection() {
        assert!(quote_ident("a\"b").is_err());
        assert!(quote_ident("").is_err());
        assert!(quote_ident("order").is_err());
        assert_eq!(quote_ident("display_name").unwrap(), "\"display_name\"");
    }

    #[test]
    fn quote_ident_accepts_renamed_reserved_words() {
        assert_eq!(quote_ident("timestamp").unwrap(), "\"event_ts\"");
        assert_eq!(quote_ident("desc").unwrap(), "\"descr\"");
    }

    #[test]
    fn like_special_chars_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
