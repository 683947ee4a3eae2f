//! Positioned text runs read back from a page content stream.
//!
//! Text-positioning and text-state operators are interpreted and the pen
//! advances after every shown glyph. Advances come from the font's `/Widths`
//! when the page resources carry them, otherwise from the standard Helvetica
//! metrics.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::Object;

/// A piece of shown text and its baseline origin in rendering space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// How shown text is cut into runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One run per showing operator, cut again at word gaps inside `TJ`.
    Runs,
    /// One run per space-separated word.
    Words,
}

/// Glyph advances of one font, in thousandths of a text space unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontWidths {
    pub first_char: u32,
    pub widths: Vec<f32>,
    pub missing_width: Option<f32>,
}

impl FontWidths {
    pub fn width(&self, code: u32) -> f32 {
        code.checked_sub(self.first_char)
            .and_then(|offset| self.widths.get(offset as usize))
            .copied()
            .or(self.missing_width)
            .unwrap_or_else(|| helvetica_width(code))
    }
}

/// Fonts of one page keyed by resource name.
pub type FontMap = HashMap<Vec<u8>, FontWidths>;

/// Helvetica advances for codes 32..=126 (WinAnsi).
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const HELVETICA_DEFAULT_WIDTH: f32 = 556.0;

pub fn helvetica_width(code: u32) -> f32 {
    match code {
        32..=126 => f32::from(HELVETICA_ASCII[(code - 32) as usize]),
        _ => HELVETICA_DEFAULT_WIDTH,
    }
}

/// Used until the first `Tf`.
const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translation(tx: f32, ty: f32) -> Self {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let n: Vec<f32> = operands.iter().filter_map(number).collect();
        if n.len() != 6 {
            return None;
        }
        Some(Matrix {
            a: n[0],
            b: n[1],
            c: n[2],
            d: n[3],
            e: n[4],
            f: n[5],
        })
    }

    /// `self × other`
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Decode a PDF string operand. UTF-16BE when it carries a BOM, otherwise
/// each byte is taken as a Latin-1 code point.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|pair| pair.len() == 2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&byte| byte as char).collect()
}

/// TJ kerning below this (thousandths of an em) reads as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

#[derive(Debug, Clone)]
struct TextParams {
    font: Vec<u8>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// `Tz` as a fraction.
    scale: f32,
    leading: f32,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            font: Vec::new(),
            size: DEFAULT_FONT_SIZE,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scale: 1.0,
            leading: 0.0,
        }
    }
}

struct PendingRun {
    text: String,
    x: f32,
    y: f32,
}

struct TextState<'a> {
    fonts: &'a FontMap,
    granularity: Granularity,
    ctm: Matrix,
    saved: Vec<(Matrix, TextParams)>,
    params: TextParams,
    tm: Matrix,
    tlm: Matrix,
    pending: Option<PendingRun>,
    runs: Vec<TextRun>,
}

impl<'a> TextState<'a> {
    fn new(fonts: &'a FontMap, granularity: Granularity) -> Self {
        Self {
            fonts,
            granularity,
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            params: TextParams::default(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            pending: None,
            runs: Vec::new(),
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translation(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.params.leading);
    }

    fn origin(&self) -> (f32, f32) {
        let origin = self.tm.then(&self.ctm);
        (origin.e, origin.f)
    }

    fn advance(&mut self, tx: f32) {
        self.tm = Matrix::translation(tx, 0.0).then(&self.tm);
    }

    fn glyph_advance(&self, code: u32) -> f32 {
        let width = self
            .fonts
            .get(&self.params.font)
            .map(|font| font.width(code))
            .unwrap_or_else(|| helvetica_width(code));
        let mut spacing = self.params.char_spacing;
        if code == 32 {
            spacing += self.params.word_spacing;
        }
        (width / 1000.0 * self.params.size + spacing) * self.params.scale
    }

    fn show(&mut self, bytes: &[u8]) {
        for ch in decode_pdf_string(bytes).chars() {
            if ch.is_whitespace() {
                match self.granularity {
                    Granularity::Words => self.flush(),
                    Granularity::Runs => {
                        if let Some(pending) = self.pending.as_mut() {
                            pending.text.push(ch);
                        }
                    }
                }
            } else {
                if self.pending.is_none() {
                    let (x, y) = self.origin();
                    self.pending = Some(PendingRun {
                        text: String::new(),
                        x,
                        y,
                    });
                }
                if let Some(pending) = self.pending.as_mut() {
                    pending.text.push(ch);
                }
            }
            self.advance(self.glyph_advance(ch as u32));
        }
    }

    fn show_array(&mut self, items: &[Object]) {
        for item in items {
            match item {
                Object::String(bytes, _) => self.show(bytes),
                other => {
                    if let Some(adjust) = number(other) {
                        if adjust < TJ_SPACE_THRESHOLD {
                            self.flush();
                        }
                        self.advance(-adjust / 1000.0 * self.params.size * self.params.scale);
                    }
                }
            }
        }
    }

    fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            let text = pending.text.trim_end();
            if !text.is_empty() {
                self.runs.push(TextRun {
                    text: text.to_string(),
                    x: pending.x,
                    y: pending.y,
                });
            }
        }
    }

    fn apply(&mut self, operation: &Operation) {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "q" => self.saved.push((self.ctm, self.params.clone())),
            "Q" => {
                if let Some((ctm, params)) = self.saved.pop() {
                    self.ctm = ctm;
                    self.params = params;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.ctm = matrix.then(&self.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.params.font = name.clone();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.params.size = size;
                }
            }
            "Tc" => {
                if let Some(spacing) = operands.first().and_then(number) {
                    self.params.char_spacing = spacing;
                }
            }
            "Tw" => {
                if let Some(spacing) = operands.first().and_then(number) {
                    self.params.word_spacing = spacing;
                }
            }
            "Tz" => {
                if let Some(scale) = operands.first().and_then(number) {
                    self.params.scale = scale / 100.0;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    self.params.leading = leading;
                }
            }
            "Tm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.tm = matrix;
                    self.tlm = matrix;
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    if operation.operator == "TD" {
                        self.params.leading = -ty;
                    }
                    self.move_line(tx, ty);
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
                self.flush();
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
                self.flush();
            }
            "\"" => {
                if let (Some(word_spacing), Some(char_spacing)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    self.params.word_spacing = word_spacing;
                    self.params.char_spacing = char_spacing;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes);
                }
                self.flush();
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_array(items);
                }
                self.flush();
            }
            _ => {}
        }
    }
}

/// Interpret a decoded content stream and collect its text runs.
pub fn runs_from_content(
    content: &Content,
    fonts: &FontMap,
    granularity: Granularity,
) -> Vec<TextRun> {
    let mut state = TextState::new(fonts, granularity);
    for operation in &content.operations {
        state.apply(operation);
    }
    state.flush();
    state.runs
}

/// Parse raw content stream bytes and collect their text runs.
pub fn extract_runs(
    content: &[u8],
    fonts: &FontMap,
    granularity: Granularity,
) -> Result<Vec<TextRun>, lopdf::Error> {
    let content = Content::decode(content)?;
    Ok(runs_from_content(&content, fonts, granularity))
}
