//! Turns a field mapping plus one row into the string that gets printed.

use super::models::Mapping;

/// Index of the header a column reference points at.
///
/// The first header equal to the trimmed reference wins; failing that, an
/// untrimmed exact match is tried. Blank references resolve to nothing.
pub fn header_index(headers: &[String], column: &str) -> Option<usize> {
    let wanted = column.trim();
    if wanted.is_empty() {
        return None;
    }
    headers
        .iter()
        .position(|header| header.trim() == wanted)
        .or_else(|| headers.iter().position(|header| header == column))
}

pub fn find_mapping<'a>(mappings: &'a [Mapping], field_id: &str) -> Option<&'a Mapping> {
    mappings.iter().find(|mapping| mapping.field_id == field_id)
}

/// Resolve a mapping against a row.
///
/// Unknown columns are skipped and empty values are dropped before joining,
/// so a blank middle column never doubles the separator.
pub fn resolve(mapping: Option<&Mapping>, row: &[String], headers: &[String]) -> String {
    let Some(mapping) = mapping else {
        return String::new();
    };

    let parts: Vec<&str> = mapping
        .columns()
        .into_iter()
        .filter_map(|column| header_index(headers, column))
        .filter_map(|index| row.get(index))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    parts.join(mapping.separator())
}
