//! Checking which word the template itself prints inside a rectangle.
//!
//! Used for a gender region: the form prints "Male" and "Female" next to each
//! other and the mark has to land on the right one. Sources are tried in order
//! (embedded text layer, then raster + OCR) and the first one that finds any
//! word wins. Every failure is logged and treated as "nothing found".

pub mod command;
pub mod ocr;
pub mod text_layer;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::fill::derived::{mentions_female, mentions_male, GenderCategory};
use crate::fill::geometry::Rect;
use crate::template::TextRun;

pub use command::{CommandError, CommandOutput, CommandRunner, SystemCommandRunner};
pub use ocr::{OcrSource, OcrTools};
pub use text_layer::TextLayerSource;

#[derive(Debug, Error)]
pub enum PerceptionError {
    #[error("temporary workspace error: {0}")]
    Workspace(#[source] std::io::Error),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("malformed OCR output: {0}")]
    Decode(String),
}

/// A word found inside the region, with its anchor in rendering space when
/// the source can tell.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceivedWord {
    pub text: String,
    pub position: Option<(f32, f32)>,
}

impl PerceivedWord {
    pub fn new(text: impl Into<String>, position: Option<(f32, f32)>) -> Self {
        Self {
            text: text.into(),
            position,
        }
    }
}

/// Everything a source may need to look at one region.
#[derive(Debug, Clone, Copy)]
pub struct PerceptionRequest<'a> {
    /// Unmodified template bytes.
    pub template: &'a [u8],
    /// 1-based page number.
    pub page: u32,
    pub page_height: f32,
    /// Rendering-space area a rasterizer draws, the page CropBox.
    pub visible_box: Rect,
    /// Region in authoring space.
    pub region: Rect,
    /// Words of the template page's text layer.
    pub runs: &'a [TextRun],
}

#[async_trait]
pub trait WordSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` or an empty list means this source saw nothing.
    async fn words(
        &self,
        request: &PerceptionRequest<'_>,
    ) -> Result<Option<Vec<PerceivedWord>>, PerceptionError>;
}

/// Ordered list of word sources.
#[derive(Clone, Default)]
pub struct PerceptionChain {
    sources: Vec<Arc<dyn WordSource>>,
}

impl PerceptionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn WordSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn text_layer_only() -> Self {
        Self::new().with_source(Arc::new(TextLayerSource::default()))
    }

    /// Text layer first, OCR second.
    pub fn standard(runner: Arc<dyn CommandRunner>, tools: OcrTools) -> Self {
        Self::text_layer_only().with_source(Arc::new(OcrSource::new(runner, tools)))
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub async fn perceive(&self, request: &PerceptionRequest<'_>) -> Vec<PerceivedWord> {
        for source in &self.sources {
            match source.words(request).await {
                Ok(Some(words)) if !words.is_empty() => {
                    log::debug!(
                        "{} found {} word(s) on page {}",
                        source.name(),
                        words.len(),
                        request.page
                    );
                    return words;
                }
                Ok(_) => log::debug!("{} found nothing on page {}", source.name(), request.page),
                Err(e) => log::warn!(
                    "{} failed on page {}: {}",
                    source.name(),
                    request.page,
                    e
                ),
            }
        }
        Vec::new()
    }
}

/// Which gender words were seen in a region and where.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenderEvidence {
    pub has_male: bool,
    pub has_female: bool,
    pub male_at: Option<(f32, f32)>,
    pub female_at: Option<(f32, f32)>,
}

impl GenderEvidence {
    pub fn from_words(words: &[PerceivedWord]) -> Self {
        let joined = words
            .iter()
            .map(|word| word.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let position_of = |test: fn(&str) -> bool| {
            words
                .iter()
                .find(|word| test(&word.text.to_lowercase()))
                .and_then(|word| word.position)
        };

        Self {
            has_male: mentions_male(&joined),
            has_female: mentions_female(&joined),
            male_at: position_of(mentions_male),
            female_at: position_of(mentions_female),
        }
    }

    /// Where to put the mark for `gender`, or `None` when nothing should be
    /// drawn. Without a word position the mark goes to `fallback`.
    pub fn mark_position(
        &self,
        gender: &GenderCategory,
        fallback: (f32, f32),
    ) -> Option<(f32, f32)> {
        match gender {
            GenderCategory::Male if self.has_male => Some(self.male_at.unwrap_or(fallback)),
            GenderCategory::Female if self.has_female => Some(self.female_at.unwrap_or(fallback)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
