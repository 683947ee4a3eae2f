//! Template document adapter.
//!
//! Wraps a parsed `lopdf` document and exposes the handful of operations the
//! fill engine needs: page count and boxes, text runs, drawing text and
//! lines on a page, and serializing the result. Drawing is buffered per page
//! and appended as one extra content stream on save, with the original page
//! content isolated between `q` / `Q`.

pub mod text;

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use thiserror::Error;

use crate::fill::geometry::Rect;

pub use text::{FontMap, FontWidths, Granularity, TextRun};

/// Resource name the overlay font is registered under on touched pages.
pub const FONT_RESOURCE: &str = "FmHelv";

/// Size used when a page carries no readable MediaBox (US Letter).
const FALLBACK_PAGE_WIDTH: f32 = 612.0;
const FALLBACK_PAGE_HEIGHT: f32 = 792.0;

/// Parent chains deeper than this are treated as broken.
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to parse template PDF: {0}")]
    Parse(#[source] lopdf::Error),
    #[error("template PDF is encrypted")]
    Encrypted,
    #[error("template PDF has no pages")]
    NoPages,
    #[error("page {0} is out of range")]
    PageOutOfRange(u32),
    #[error("failed to read content of page {page}: {message}")]
    Content { page: u32, message: String },
    #[error("failed to write overlay: {0}")]
    Overlay(String),
    #[error("failed to serialize document: {0}")]
    Save(String),
}

/// A drawing primitive in rendering space.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
    },
    Line {
        start: (f32, f32),
        end: (f32, f32),
        thickness: f32,
        /// DeviceGray level, 0 is black.
        gray: f32,
    },
}

impl DrawOp {
    pub fn text(text: impl Into<String>, x: f32, y: f32, size: f32) -> Self {
        DrawOp::Text {
            text: text.into(),
            x,
            y,
            size,
        }
    }
}

/// One freshly parsed, independently mutable copy of the template.
pub struct TemplateDocument {
    inner: Document,
    pages: Vec<ObjectId>,
    heights: Vec<f32>,
    visible: Vec<Rect>,
    overlays: BTreeMap<usize, Vec<Operation>>,
}

impl TemplateDocument {
    pub fn load(bytes: &[u8]) -> Result<Self, TemplateError> {
        let inner = Document::load_mem(bytes).map_err(TemplateError::Parse)?;
        if inner.is_encrypted() {
            return Err(TemplateError::Encrypted);
        }

        let pages: Vec<ObjectId> = inner.get_pages().values().copied().collect();
        if pages.is_empty() {
            return Err(TemplateError::NoPages);
        }

        let heights = pages
            .iter()
            .map(|&page_id| media_box(&inner, page_id).height)
            .collect();
        let visible = pages
            .iter()
            .map(|&page_id| visible_box(&inner, page_id))
            .collect();

        Ok(Self {
            inner,
            pages,
            heights,
            visible,
            overlays: BTreeMap::new(),
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Height of a 1-based page, `None` when the page does not exist.
    pub fn page_height(&self, page: u32) -> Option<f32> {
        self.page_index(page).map(|index| self.heights[index])
    }

    /// Heights of every page, in order.
    pub fn page_heights(&self) -> &[f32] {
        &self.heights
    }

    /// CropBox of every page in rendering space, MediaBox when uncropped.
    /// This is the area a rasterizer renders.
    pub fn visible_boxes(&self) -> &[Rect] {
        &self.visible
    }

    fn page_index(&self, page: u32) -> Option<usize> {
        let index = (page as usize).checked_sub(1)?;
        (index < self.pages.len()).then_some(index)
    }

    /// Text runs of the template's own content on a page. Drawing done
    /// through this document is not visible here until saved and reloaded.
    pub fn text_runs(&self, page: u32) -> Result<Vec<TextRun>, TemplateError> {
        self.read_text(page, Granularity::Runs)
    }

    /// Like [`Self::text_runs`], one entry per space-separated word.
    pub fn text_words(&self, page: u32) -> Result<Vec<TextRun>, TemplateError> {
        self.read_text(page, Granularity::Words)
    }

    fn read_text(&self, page: u32, granularity: Granularity) -> Result<Vec<TextRun>, TemplateError> {
        let index = self
            .page_index(page)
            .ok_or(TemplateError::PageOutOfRange(page))?;
        let page_id = self.pages[index];
        let content = self
            .inner
            .get_page_content(page_id)
            .map_err(|err| TemplateError::Content {
                page,
                message: err.to_string(),
            })?;
        let fonts = page_fonts(&self.inner, page_id);
        text::extract_runs(&content, &fonts, granularity).map_err(|err| TemplateError::Content {
            page,
            message: err.to_string(),
        })
    }

    pub fn draw(&mut self, page: u32, op: &DrawOp) -> Result<(), TemplateError> {
        let index = self
            .page_index(page)
            .ok_or(TemplateError::PageOutOfRange(page))?;
        let operations = self.overlays.entry(index).or_default();
        match op {
            DrawOp::Text { text, x, y, size } => {
                operations.extend(text_operations(text, *x, *y, *size))
            }
            DrawOp::Line {
                start,
                end,
                thickness,
                gray,
            } => operations.extend(line_operations(*start, *end, *thickness, *gray)),
        }
        Ok(())
    }

    pub fn draw_all(&mut self, page: u32, ops: &[DrawOp]) -> Result<(), TemplateError> {
        ops.iter().try_for_each(|op| self.draw(page, op))
    }

    /// Apply buffered drawing and serialize.
    pub fn save(mut self) -> Result<Vec<u8>, TemplateError> {
        self.flush_overlays()?;
        let mut out = Vec::new();
        self.inner
            .save_to(&mut out)
            .map_err(|err| TemplateError::Save(err.to_string()))?;
        Ok(out)
    }

    fn flush_overlays(&mut self) -> Result<(), TemplateError> {
        if self.overlays.is_empty() {
            return Ok(());
        }

        let font_id = self.inner.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let overlays = std::mem::take(&mut self.overlays);
        for (index, operations) in overlays {
            let page_id = self.pages[index];
            let body = Content { operations }
                .encode()
                .map_err(|err| TemplateError::Overlay(err.to_string()))?;

            let mut overlay = b"\nQ\n".to_vec();
            overlay.extend(body);

            let existing = self.inner.get_page_contents(page_id);
            let save_id = self
                .inner
                .add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
            let overlay_id = self.inner.add_object(Stream::new(dictionary! {}, overlay));

            let mut contents = Vec::with_capacity(existing.len() + 2);
            contents.push(Object::Reference(save_id));
            contents.extend(existing.into_iter().map(Object::Reference));
            contents.push(Object::Reference(overlay_id));

            let mut resources = inherited_dict(&self.inner, page_id, b"Resources");
            let mut fonts = match resources.get(b"Font") {
                Ok(object) => resolve(&self.inner, object)
                    .and_then(|object| object.as_dict().ok())
                    .cloned()
                    .unwrap_or_default(),
                Err(_) => Dictionary::new(),
            };
            fonts.set(FONT_RESOURCE, Object::Reference(font_id));
            resources.set("Font", Object::Dictionary(fonts));

            let page = self
                .inner
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|err| TemplateError::Overlay(err.to_string()))?;
            page.set("Contents", Object::Array(contents));
            page.set("Resources", Object::Dictionary(resources));
        }
        Ok(())
    }
}

fn text_operations(text: &str, x: f32, y: f32, size: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("g", vec![Object::Integer(0)]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), Object::from(size)],
        ),
        Operation::new("Td", vec![Object::from(x), Object::from(y)]),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn line_operations(start: (f32, f32), end: (f32, f32), thickness: f32, gray: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("G", vec![Object::from(gray)]),
        Operation::new("w", vec![Object::from(thickness)]),
        Operation::new("m", vec![Object::from(start.0), Object::from(start.1)]),
        Operation::new("l", vec![Object::from(end.0), Object::from(end.1)]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Encode text for a standard font with WinAnsiEncoding. Characters outside
/// the encoding become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|ch| !ch.is_control())
        .map(|ch| match ch {
            ' '..='~' => ch as u8,
            '\u{A0}'..='\u{FF}' => ch as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Look up a page attribute, following `Parent` links for inherited values.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_object(page_id).and_then(Object::as_dict).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_object(parent).and_then(Object::as_dict).ok()?;
    }
    None
}

fn inherited_dict(doc: &Document, page_id: ObjectId, key: &[u8]) -> Dictionary {
    inherited(doc, page_id, key)
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// A page box as a rendering-space rectangle.
fn page_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Rect> {
    let values: Vec<f32> = inherited(doc, page_id, key)?
        .as_array()
        .ok()?
        .iter()
        .filter_map(|value| resolve(doc, value).and_then(number))
        .collect();
    match values.as_slice() {
        [llx, lly, urx, ury] => Some(Rect::new(
            llx.min(*urx),
            lly.min(*ury),
            (urx - llx).abs(),
            (ury - lly).abs(),
        )),
        _ => None,
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> Rect {
    page_box(doc, page_id, b"MediaBox")
        .filter(Rect::is_valid)
        .unwrap_or_else(|| Rect::new(0.0, 0.0, FALLBACK_PAGE_WIDTH, FALLBACK_PAGE_HEIGHT))
}

fn visible_box(doc: &Document, page_id: ObjectId) -> Rect {
    page_box(doc, page_id, b"CropBox")
        .filter(Rect::is_valid)
        .unwrap_or_else(|| media_box(doc, page_id))
}

fn number_of(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    dict.get(key)
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(number)
}

/// Advance widths of the fonts in a page's resources.
fn page_fonts(doc: &Document, page_id: ObjectId) -> FontMap {
    let resources = inherited_dict(doc, page_id, b"Resources");
    let Some(fonts) = resources
        .get(b"Font")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_dict().ok())
    else {
        return FontMap::new();
    };

    fonts
        .iter()
        .filter_map(|(name, object)| {
            let font = resolve(doc, object)?.as_dict().ok()?;
            Some((name.clone(), font_widths(doc, font)))
        })
        .collect()
}

fn font_widths(doc: &Document, font: &Dictionary) -> FontWidths {
    let widths = font
        .get(b"Widths")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_array().ok())
        .map(|values| {
            values
                .iter()
                .map(|value| resolve(doc, value).and_then(number).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();
    let missing_width = font
        .get(b"FontDescriptor")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_dict().ok())
        .and_then(|descriptor| number_of(doc, descriptor, b"MissingWidth"));

    FontWidths {
        first_char: number_of(doc, font, b"FirstChar").map_or(0, |code| code as u32),
        widths,
        missing_width,
    }
}

#[cfg(test)]
mod tests;
