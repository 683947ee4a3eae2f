//! Type-driven drawing of one field value.
//!
//! Everything here works on a rectangle already converted to rendering space
//! and returns draw operations. Nothing touches a document directly.

use crate::template::DrawOp;

use super::geometry::Rect;
use super::models::{Field, FieldType, GridDirection};

pub const MIN_FONT_SIZE: f32 = 6.0;
pub const MAX_FONT_SIZE: f32 = 10.0;

/// Left inset of text and marks from the rectangle's edge.
pub const TEXT_INSET: f32 = 2.0;

pub const CHECK_MARK: &str = "X";
pub const CHECK_MARK_SIZE: f32 = 10.0;
pub const RADIO_MARK: &str = "•";
pub const RADIO_MARK_SIZE: f32 = 10.0;
pub const DERIVED_MARK_SIZE: f32 = 12.0;

pub const GRID_LINE_THICKNESS: f32 = 0.5;
pub const GRID_LINE_GRAY: f32 = 0.7;

/// Glyph offset from a cell centre, as a fraction of the font size.
const GLYPH_CENTERING: f32 = 0.3;

pub fn clamp_font_size(available: f32) -> f32 {
    (available - 2.0).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Vertical offset placing a mark roughly on the rectangle's midline.
fn mark_baseline(area: &Rect) -> f32 {
    area.y + area.height / 2.0 - 6.0
}

/// Where a mark sits when no better anchor is known.
pub fn mark_anchor(area: &Rect) -> (f32, f32) {
    (area.x + TEXT_INSET, mark_baseline(area))
}

/// The "X" drawn for a derived condition that holds.
pub fn derived_mark(area: &Rect) -> DrawOp {
    let (x, y) = mark_anchor(area);
    derived_mark_at(x, y)
}

pub fn derived_mark_at(x: f32, y: f32) -> DrawOp {
    DrawOp::text(CHECK_MARK, x, y, DERIVED_MARK_SIZE)
}

fn checkbox_checked(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value.eq_ignore_ascii_case("no") || value == "0")
}

/// Draw operations for a mapped field's resolved value. `area` is in
/// rendering space.
pub fn render_value(field: &Field, area: &Rect, value: &str) -> Vec<DrawOp> {
    match field.kind {
        FieldType::Checkbox => {
            if checkbox_checked(value) {
                let (x, y) = mark_anchor(area);
                vec![DrawOp::text(CHECK_MARK, x, y, CHECK_MARK_SIZE)]
            } else {
                Vec::new()
            }
        }
        FieldType::Radio => {
            if value.is_empty() {
                Vec::new()
            } else {
                vec![DrawOp::text(
                    RADIO_MARK,
                    area.x + area.width / 2.0 - 3.0,
                    mark_baseline(area),
                    RADIO_MARK_SIZE,
                )]
            }
        }
        FieldType::Grid => {
            layout_grid(area, field.grid_block_count(), field.grid_direction, value).into_ops()
        }
        FieldType::Text | FieldType::Number | FieldType::Date | FieldType::Other => {
            if value.is_empty() {
                return Vec::new();
            }
            let size = clamp_font_size(area.height);
            vec![DrawOp::text(
                value,
                area.x + TEXT_INSET,
                area.y + (area.height - size) / 2.0,
                size,
            )]
        }
    }
}

/// Split a value into exactly `blocks` cells: whitespace removed, truncated,
/// then padded with blanks.
pub fn grid_cells(value: &str, blocks: usize) -> Vec<char> {
    let mut cells: Vec<char> = value
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .take(blocks)
        .collect();
    cells.resize(blocks, ' ');
    cells
}

/// A grid field laid out in rendering space.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    pub separators: Vec<DrawOp>,
    pub glyphs: Vec<DrawOp>,
}

impl GridLayout {
    pub fn into_ops(self) -> Vec<DrawOp> {
        let mut ops = self.separators;
        ops.extend(self.glyphs);
        ops
    }
}

fn separator(start: (f32, f32), end: (f32, f32)) -> DrawOp {
    DrawOp::Line {
        start,
        end,
        thickness: GRID_LINE_THICKNESS,
        gray: GRID_LINE_GRAY,
    }
}

pub fn layout_grid(area: &Rect, blocks: usize, direction: GridDirection, value: &str) -> GridLayout {
    let blocks = blocks.max(1);
    let cells = grid_cells(value, blocks);
    let mut separators = Vec::with_capacity(blocks - 1);
    let mut glyphs = Vec::new();

    match direction {
        GridDirection::Horizontal => {
            let cell_width = area.width / blocks as f32;
            let size = clamp_font_size(area.height);
            for i in 1..blocks {
                let x = area.x + cell_width * i as f32;
                separators.push(separator((x, area.y), (x, area.y + area.height)));
            }
            for (i, ch) in cells.iter().enumerate() {
                if *ch == ' ' {
                    continue;
                }
                let centre = area.x + cell_width * (i as f32 + 0.5);
                glyphs.push(DrawOp::text(
                    ch.to_string(),
                    centre - GLYPH_CENTERING * size,
                    area.y + (area.height - size) / 2.0,
                    size,
                ));
            }
        }
        GridDirection::Vertical => {
            let cell_height = area.height / blocks as f32;
            let size = clamp_font_size(cell_height);
            let top = area.y + area.height;
            for i in 1..blocks {
                let y = top - cell_height * i as f32;
                separators.push(separator((area.x, y), (area.x + area.width, y)));
            }
            let centre = area.x + area.width / 2.0;
            for (i, ch) in cells.iter().enumerate() {
                if *ch == ' ' {
                    continue;
                }
                let cell_bottom = top - cell_height * (i as f32 + 1.0);
                glyphs.push(DrawOp::text(
                    ch.to_string(),
                    centre - GLYPH_CENTERING * size,
                    cell_bottom + (cell_height - size) / 2.0,
                    size,
                ));
            }
        }
    }

    GridLayout { separators, glyphs }
}
