//! Row sanitization applied once per batch, before any document is generated.

use std::collections::HashSet;

use super::models::{RawRow, Row};

/// Trim every cell; missing cells become empty strings.
pub fn normalize_row(row: &[Option<String>]) -> Row {
    row.iter()
        .map(|cell| cell.as_deref().map(str::trim).unwrap_or_default().to_string())
        .collect()
}

pub fn is_blank(row: &[String]) -> bool {
    row.iter().all(String::is_empty)
}

/// Normalize rows, drop blank ones, then drop exact duplicates of an earlier
/// surviving row. First occurrences keep their relative order.
///
/// Equality is exact after trimming: rows differing only in case or inner
/// whitespace are kept apart.
pub fn sanitize_rows(rows: &[RawRow]) -> Vec<Row> {
    let mut seen: HashSet<Row> = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());

    for row in rows {
        let normalized = normalize_row(row);
        if is_blank(&normalized) {
            continue;
        }
        if seen.insert(normalized.clone()) {
            kept.push(normalized);
        }
    }

    if kept.len() != rows.len() {
        log::info!(
            "Filtered rows: original={}, afterFilter={}",
            rows.len(),
            kept.len()
        );
    }

    kept
}
