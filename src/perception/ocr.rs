//! Raster + OCR word source.
//!
//! The template is written to a scratch directory, the one page of interest is
//! rasterized at 72 DPI so that pixels line up with points, and the image is
//! fed to tesseract in TSV mode. The scratch directory goes away on drop,
//! whatever the outcome.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use super::command::CommandRunner;
use super::{PerceivedWord, PerceptionError, PerceptionRequest, WordSource};
use crate::fill::geometry::{to_authoring_space, Rect};

pub const DEFAULT_RASTERIZER: &str = "pdftoppm";
pub const DEFAULT_OCR: &str = "tesseract";

/// Rasterization resolution. At 72 DPI one pixel is one point.
pub const RASTER_DPI: u32 = 72;

/// Slack around the region when matching word boxes, in pixels.
pub const OCR_TOLERANCE: f32 = 2.0;

/// TSV `level` value of word rows.
const WORD_LEVEL: &str = "5";

const TEMPLATE_FILE: &str = "template.pdf";
const RASTER_PREFIX: &str = "page";

/// Names of the external binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrTools {
    pub rasterizer: String,
    pub ocr: String,
}

impl Default for OcrTools {
    fn default() -> Self {
        Self {
            rasterizer: DEFAULT_RASTERIZER.to_string(),
            ocr: DEFAULT_OCR.to_string(),
        }
    }
}

/// One word box from tesseract, in pixel space (top-left origin).
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Parse tesseract TSV output, keeping word rows with non-empty text.
pub fn parse_tsv(tsv: &str) -> Result<Vec<OcrWord>, PerceptionError> {
    let mut lines = tsv.lines();
    let header = lines
        .next()
        .ok_or_else(|| PerceptionError::Decode("empty TSV output".to_string()))?;

    let columns: Vec<&str> = header.split('\t').collect();
    let column = |name: &str| {
        columns
            .iter()
            .position(|column| column.trim() == name)
            .ok_or_else(|| PerceptionError::Decode(format!("missing TSV column {}", name)))
    };
    let level = column("level")?;
    let left = column("left")?;
    let top = column("top")?;
    let width = column("width")?;
    let height = column("height")?;
    let text = column("text")?;

    let number = |cells: &[&str], index: usize| -> Result<f32, PerceptionError> {
        let cell = cells.get(index).copied().unwrap_or_default().trim();
        cell.parse::<f32>()
            .map_err(|_| PerceptionError::Decode(format!("invalid number {:?}", cell)))
    };

    let mut words = Vec::new();
    for line in lines {
        let cells: Vec<&str> = line.split('\t').collect();
        if cells.get(level).map(|cell| cell.trim()) != Some(WORD_LEVEL) {
            continue;
        }
        let word = cells.get(text).map(|cell| cell.trim()).unwrap_or_default();
        if word.is_empty() {
            continue;
        }
        words.push(OcrWord {
            text: word.to_string(),
            left: number(&cells, left)?,
            top: number(&cells, top)?,
            width: number(&cells, width)?,
            height: number(&cells, height)?,
        });
    }
    Ok(words)
}

/// Keep word boxes whose top-left corner falls inside `region` and reproject
/// their anchor to rendering space.
///
/// At 72 DPI one pixel is one point, measured from the top-left corner of
/// `visible_box` (the CropBox the rasterizer renders). `region` is in
/// authoring space over a page of `page_height`.
pub fn words_in_region(
    words: &[OcrWord],
    region: &Rect,
    page_height: f32,
    visible_box: &Rect,
) -> Vec<PerceivedWord> {
    words
        .iter()
        .filter_map(|word| {
            let x = visible_box.x + word.left;
            let y = visible_box.y + visible_box.height - word.top - word.height;
            let (_, top) = to_authoring_space(page_height, x, y, word.height);
            region
                .contains(x, top, OCR_TOLERANCE)
                .then(|| PerceivedWord::new(word.text.clone(), Some((x, y))))
        })
        .collect()
}

pub struct OcrSource {
    runner: Arc<dyn CommandRunner>,
    tools: OcrTools,
}

impl OcrSource {
    pub fn new(runner: Arc<dyn CommandRunner>, tools: OcrTools) -> Self {
        Self { runner, tools }
    }

    async fn recognize(&self, request: &PerceptionRequest<'_>) -> Result<String, PerceptionError> {
        let scratch = TempDir::new().map_err(PerceptionError::Workspace)?;
        let pdf_path = scratch.path().join(TEMPLATE_FILE);
        tokio::fs::write(&pdf_path, request.template)
            .await
            .map_err(PerceptionError::Workspace)?;

        let prefix = scratch.path().join(RASTER_PREFIX);
        let page = request.page.to_string();
        let raster_args = vec![
            "-r".to_string(),
            RASTER_DPI.to_string(),
            "-f".to_string(),
            page.clone(),
            "-l".to_string(),
            page,
            "-png".to_string(),
            "-singlefile".to_string(),
            pdf_path.to_string_lossy().into_owned(),
            prefix.to_string_lossy().into_owned(),
        ];
        self.runner.run(&self.tools.rasterizer, &raster_args).await?;

        let image = prefix.with_extension("png");
        let ocr_args = vec![
            image.to_string_lossy().into_owned(),
            "stdout".to_string(),
            "tsv".to_string(),
        ];
        let output = self.runner.run(&self.tools.ocr, &ocr_args).await?;
        Ok(output.stdout_lossy())
    }
}

#[async_trait]
impl WordSource for OcrSource {
    fn name(&self) -> &'static str {
        "ocr"
    }

    async fn words(
        &self,
        request: &PerceptionRequest<'_>,
    ) -> Result<Option<Vec<PerceivedWord>>, PerceptionError> {
        let tsv = self.recognize(request).await?;
        let words = parse_tsv(&tsv)?;
        let found = words_in_region(
            &words,
            &request.region,
            request.page_height,
            &request.visible_box,
        );
        Ok((!found.is_empty()).then_some(found))
    }
}
