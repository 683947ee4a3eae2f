use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::fill::{Field, GenerationReport, Mapping, RowFailure};

#[derive(Deserialize, Debug, ToSchema)]
pub struct GenerateRequest {
    /// Rectangles drawn in the field editor.
    #[schema(value_type = Vec<Object>)]
    pub fields: Vec<Field>,
    #[schema(value_type = Vec<Object>)]
    #[serde(default)]
    pub mappings: Vec<Mapping>,
    /// Overrides the configured table's headers.
    #[serde(default)]
    pub headers: Option<Vec<String>>,
    /// Overrides the configured table's rows. Cells may be any JSON scalar.
    #[schema(value_type = Option<Vec<Vec<Object>>>)]
    #[serde(default)]
    pub rows: Option<Vec<Vec<Value>>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct FailedRow {
    pub row: usize,
    pub error: String,
}

impl From<&RowFailure> for FailedRow {
    fn from(failure: &RowFailure) -> Self {
        Self {
            row: failure.ordinal,
            error: failure.message.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct GenerateResponse {
    pub success: bool,
    pub count: usize,
    /// Generated file names, in row order.
    pub files: Vec<String>,
    pub failed: Vec<FailedRow>,
}

impl From<&GenerationReport> for GenerateResponse {
    fn from(report: &GenerationReport) -> Self {
        Self {
            success: true,
            count: report.count(),
            files: report
                .files
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
            failed: report.failed.iter().map(FailedRow::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct OutputListResponse {
    pub files: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ClearOutputResponse {
    pub success: bool,
    pub removed: usize,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct HeadersResponse {
    pub headers: Vec<String>,
}
