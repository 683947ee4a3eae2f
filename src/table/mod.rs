//! Tabular input. Either the first sheet of an `.xlsx` workbook, its first
//! row holding the headers, or a JSON file of the form
//! `{ "headers": [...], "rows": [[...], ...] }`.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, Xlsx, XlsxError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::fill::RawRow;

pub const PREVIEW_ROWS: usize = 3;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid table JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid workbook: {0}")]
    Workbook(#[from] XlsxError),
    #[error("workbook has no sheets")]
    NoSheets,
    #[error("table has no headers")]
    NoHeaders,
}

/// Workbook extensions read with calamine. Anything else is JSON.
const WORKBOOK_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| extension.eq_ignore_ascii_case(known))
        })
}

#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default)]
    headers: Vec<Value>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

/// Text of one cell. Scalars are printed as-is, `null` is empty and nested
/// values keep their JSON form.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

/// Text of one workbook cell. Blank and error cells are empty.
fn workbook_cell(data: &Data) -> Option<String> {
    match data {
        Data::Empty | Data::Error(_) => None,
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Table {
    pub headers: Vec<String>,
    #[schema(value_type = Vec<Vec<Option<String>>>)]
    pub rows: Vec<RawRow>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { headers, rows }
    }

    pub fn from_json_values(headers: &[Value], rows: &[Vec<Value>]) -> Result<Self, TableError> {
        let headers: Vec<String> = headers
            .iter()
            .map(|value| cell_text(value).unwrap_or_default().trim().to_string())
            .collect();
        if headers.is_empty() {
            return Err(TableError::NoHeaders);
        }

        let rows = rows
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        Ok(Self { headers, rows })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, TableError> {
        let file: TableFile = serde_json::from_slice(bytes)?;
        Self::from_json_values(&file.headers, &file.rows)
    }

    /// First sheet of an xlsx workbook. Row 0 is the header row.
    pub fn from_workbook(bytes: Vec<u8>) -> Result<Self, TableError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
        let sheet = workbook
            .worksheet_range_at(0)
            .ok_or(TableError::NoSheets)??;

        let mut rows = sheet.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|cells| {
                cells
                    .iter()
                    .map(|cell| workbook_cell(cell).unwrap_or_default().trim().to_string())
                    .collect()
            })
            .unwrap_or_default();
        if headers.is_empty() {
            return Err(TableError::NoHeaders);
        }

        let rows = rows
            .map(|cells| cells.iter().map(workbook_cell).collect())
            .collect();
        Ok(Self { headers, rows })
    }

    /// Read a table from disk, as a workbook or as JSON by extension.
    pub async fn load(path: &Path) -> Result<Self, TableError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| TableError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table = if is_workbook(path) {
            Self::from_workbook(bytes)?
        } else {
            Self::from_slice(&bytes)?
        };
        log::debug!(
            "Loaded table {} ({} columns, {} rows)",
            path.display(),
            table.headers.len(),
            table.rows.len()
        );
        Ok(table)
    }

    /// Headers plus the first `n` rows.
    pub fn preview(&self, n: usize) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}
