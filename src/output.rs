//! The directory generated documents are written to.

use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

pub const DEFAULT_OUTPUT_PREFIX: &str = "student";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to create output directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read output directory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("background write task failed: {0}")]
    Task(String),
}

/// `<prefix>_<ordinal>.pdf`, ordinal 1-based.
///
/// The prefix is cut at spaces and dashes; each piece keeps its ASCII
/// letters, digits and `_`, lowercased, and the non-empty pieces are joined
/// with `-`. Nothing left means [`DEFAULT_OUTPUT_PREFIX`].
pub fn output_file_name(prefix: &str, ordinal: usize) -> String {
    let pieces: Vec<String> = prefix
        .split(|ch: char| ch.is_whitespace() || ch == '-')
        .map(|piece| {
            piece
                .chars()
                .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
                .map(|ch| ch.to_ascii_lowercase())
                .collect::<String>()
        })
        .filter(|piece| !piece.is_empty())
        .collect();

    if pieces.is_empty() {
        format!("{}_{}.pdf", DEFAULT_OUTPUT_PREFIX, ordinal)
    } else {
        format!("{}_{}.pdf", pieces.join("-"), ordinal)
    }
}

/// Orders `student_2.pdf` before `student_10.pdf`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let split = |s: &str| -> (String, u64) {
        let stem = s.strip_suffix(".pdf").unwrap_or(s);
        let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let (head, tail) = stem.split_at(stem.len() - digits);
        (head.to_string(), tail.parse().unwrap_or(0))
    };
    split(a).cmp(&split(b)).then_with(|| a.cmp(b))
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> Result<(), OutputError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| OutputError::Create {
                path: self.root.clone(),
                source,
            })
    }

    /// Write `bytes` under `file_name` atomically: a temp file in the same
    /// directory is filled, then renamed over the target.
    pub async fn persist(&self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf, OutputError> {
        let root = self.root.clone();
        let destination = self.root.join(file_name);

        tokio::task::spawn_blocking(move || -> Result<PathBuf, OutputError> {
            let write_err = |source| OutputError::Write {
                path: destination.clone(),
                source,
            };
            let mut file = NamedTempFile::new_in(&root).map_err(write_err)?;
            file.write_all(&bytes).map_err(write_err)?;
            file.as_file().sync_all().map_err(write_err)?;
            file.persist(&destination)
                .map_err(|e| write_err(e.error))?;
            Ok(destination)
        })
        .await
        .map_err(|e| OutputError::Task(e.to_string()))?
    }

    /// Names of the PDF files in the directory, naturally sorted. A missing
    /// directory lists as empty.
    pub async fn list_pdfs(&self) -> Result<Vec<String>, OutputError> {
        let read_err = |source| OutputError::Read {
            path: self.root.clone(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(read_err(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(read_err)?;
            if !file_type.is_file() || !is_pdf(&path) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }

        names.sort_by(|a, b| natural_cmp(a, b));
        Ok(names)
    }

    /// Remove every regular file in the directory and return how many went.
    pub async fn clear(&self) -> Result<usize, OutputError> {
        let read_err = |source| OutputError::Read {
            path: self.root.clone(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(read_err(e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            if !entry.file_type().await.map_err(read_err)?.is_file() {
                continue;
            }
            let path = entry.path();
            tokio::fs::remove_file(&path)
                .await
                .map_err(|source| OutputError::Write { path, source })?;
            removed += 1;
        }

        log::info!("Cleared {} file(s) from {}", removed, self.root.display());
        Ok(removed)
    }
}
