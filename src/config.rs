//! Settings read from the environment (and `.env` when present).

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::output::DEFAULT_OUTPUT_PREFIX;
use crate::perception::ocr::{DEFAULT_OCR, DEFAULT_RASTERIZER};
use crate::perception::OcrTools;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },
    #[error("{name} must be true or false, got {value:?}")]
    InvalidFlag { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Template PDF the batch fills.
    pub form_path: PathBuf,
    pub output_dir: PathBuf,
    /// Default table (`.xlsx` or JSON) used when a request carries no rows.
    pub table_path: PathBuf,
    pub output_prefix: String,
    pub bind_addr: String,
    pub port: u16,
    pub ocr_tools: OcrTools,
    pub ocr_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            form_path: PathBuf::from("data/form.pdf"),
            output_dir: PathBuf::from("output"),
            table_path: PathBuf::from("data/table.json"),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            ocr_tools: OcrTools::default(),
            ocr_enabled: true,
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { name, value }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let port = match var("FILLMEUP_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidPort {
                name: "FILLMEUP_PORT",
                value,
            })?,
            None => defaults.port,
        };
        let ocr_enabled = match var("FILLMEUP_OCR_ENABLED") {
            Some(value) => parse_flag("FILLMEUP_OCR_ENABLED", value)?,
            None => defaults.ocr_enabled,
        };

        Ok(Self {
            form_path: var("FILLMEUP_FORM_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.form_path),
            output_dir: var("FILLMEUP_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            table_path: var("FILLMEUP_TABLE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.table_path),
            output_prefix: var("FILLMEUP_OUTPUT_PREFIX").unwrap_or(defaults.output_prefix),
            bind_addr: var("FILLMEUP_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            ocr_tools: OcrTools {
                rasterizer: var("FILLMEUP_RASTERIZER").unwrap_or_else(|| DEFAULT_RASTERIZER.to_string()),
                ocr: var("FILLMEUP_OCR").unwrap_or_else(|| DEFAULT_OCR.to_string()),
            },
            ocr_enabled,
        })
    }
}
