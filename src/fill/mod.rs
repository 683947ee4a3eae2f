//! The fill engine: decides what to draw on a template for one data row.

pub mod derived;
pub mod generator;
pub mod geometry;
pub mod models;
pub mod render;
pub mod resolver;
pub mod sanitize;

pub use derived::{DerivedConditions, FieldRole, GenderCategory};
pub use generator::{GenerateError, GenerationReport, Generator, RowFailure};
pub use geometry::Rect;
pub use models::{Field, FieldType, GridDirection, Mapping, RawRow, Row};
