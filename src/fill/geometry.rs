//! Conversions between authoring space and rendering space.
//!
//! Authoring space is what the field editor records: origin at the top-left of
//! the page, y growing downward. Rendering space is PDF user space: origin at
//! the bottom-left, y growing upward. Both use PDF points.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle. Which space it lives in depends on the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Width and height must both be strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Re-express an authoring-space rectangle in rendering space.
    pub fn to_render_space(&self, page_height: f32) -> Rect {
        let (x, y) = to_render_space(page_height, self.x, self.y, self.height);
        Rect::new(x, y, self.width, self.height)
    }

    /// Re-express a rendering-space rectangle in authoring space.
    pub fn to_authoring_space(&self, page_height: f32) -> Rect {
        let (x, y) = to_authoring_space(page_height, self.x, self.y, self.height);
        Rect::new(x, y, self.width, self.height)
    }

    /// Inclusive containment test, widened by `tolerance` on every side.
    pub fn contains(&self, px: f32, py: f32, tolerance: f32) -> bool {
        px >= self.x - tolerance
            && px <= self.x + self.width + tolerance
            && py >= self.y - tolerance
            && py <= self.y + self.height + tolerance
    }
}

/// `(x, y_top)` of a box in authoring space to `(x, y_bottom)` in rendering space.
pub fn to_render_space(page_height: f32, x: f32, y_top: f32, height: f32) -> (f32, f32) {
    (x, page_height - y_top - height)
}

/// Inverse of [`to_render_space`]. The formula is its own inverse.
pub fn to_authoring_space(page_height: f32, x: f32, y_bottom: f32, height: f32) -> (f32, f32) {
    (x, page_height - y_bottom - height)
}
