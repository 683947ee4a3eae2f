use serde::{Deserialize, Serialize};

use super::geometry::Rect;

/// Cells of one input row before sanitization. `None` stands for an empty/null cell.
pub type RawRow = Vec<Option<String>>;

/// A trimmed, sanitized row aligned with the table headers.
pub type Row = Vec<String>;

pub const DEFAULT_GRID_BLOCKS: u32 = 11;
pub const MAX_GRID_BLOCKS: u32 = 99;
pub const DEFAULT_SEPARATOR: &str = " ";

/// Declared type of a field, as chosen in the field editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Date,
    Checkbox,
    Radio,
    Grid,
    /// Anything the editor may add later; drawn like text.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridDirection {
    /// One glyph per column.
    #[default]
    Horizontal,
    /// One glyph per row, top to bottom.
    Vertical,
}

/// A rectangle drawn on the template, in authoring space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(flatten)]
    pub rect: Rect,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_blocks: Option<i64>,
    #[serde(default)]
    pub grid_direction: GridDirection,
}

fn default_page() -> u32 {
    1
}

impl Field {
    pub fn new(id: impl Into<String>, page: u32, rect: Rect, kind: FieldType) -> Self {
        Self {
            id: id.into(),
            page,
            rect,
            label: String::new(),
            kind,
            grid_blocks: None,
            grid_direction: GridDirection::Horizontal,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_grid(mut self, blocks: i64, direction: GridDirection) -> Self {
        self.kind = FieldType::Grid;
        self.grid_blocks = Some(blocks);
        self.grid_direction = direction;
        self
    }

    /// Number of grid cells, clamped to `1..=99`. Missing or zero falls back to 11.
    pub fn grid_block_count(&self) -> usize {
        let blocks = match self.grid_blocks {
            None | Some(0) => DEFAULT_GRID_BLOCKS as i64,
            Some(n) => n,
        };
        blocks.clamp(1, MAX_GRID_BLOCKS as i64) as usize
    }
}

/// Which table columns feed a field.
///
/// Accepts both the multi-column shape (`excelColumns`) and the older
/// single-column shape (`excelColumn`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub field_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excel_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excel_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

impl Mapping {
    pub fn new<I, S>(field_id: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_id: field_id.into(),
            excel_columns: columns.into_iter().map(Into::into).collect(),
            excel_column: None,
            separator: None,
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Column references in join order.
    pub fn columns(&self) -> Vec<&str> {
        if !self.excel_columns.is_empty() {
            self.excel_columns.iter().map(String::as_str).collect()
        } else {
            self.excel_column.as_deref().into_iter().collect()
        }
    }

    pub fn separator(&self) -> &str {
        self.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR)
    }
}
