//! Batch generation: one filled copy of the template per sanitized row.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::output::{output_file_name, OutputDir, OutputError, DEFAULT_OUTPUT_PREFIX};
use crate::perception::{GenderEvidence, PerceivedWord, PerceptionChain, PerceptionRequest};
use crate::template::{DrawOp, TemplateDocument, TemplateError, TextRun};

use super::derived::{DerivedConditions, FieldRole, GenderCategory};
use super::geometry::Rect;
use super::models::{Field, Mapping, RawRow};
use super::render::{derived_mark, derived_mark_at, mark_anchor, render_value};
use super::resolver::{find_mapping, resolve};
use super::sanitize::sanitize_rows;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    OutputDir(#[from] OutputError),
    #[error("template cannot be used: {0}")]
    Template(#[from] TemplateError),
}

/// Why a single row produced no document. The batch carries on.
#[derive(Debug, Error)]
pub enum RowError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Persist(#[from] OutputError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based position among the sanitized rows.
    pub ordinal: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub files: Vec<PathBuf>,
    pub failed: Vec<RowFailure>,
    pub input_rows: usize,
    pub sanitized_rows: usize,
}

impl GenerationReport {
    pub fn count(&self) -> usize {
        self.files.len()
    }
}

/// Per-batch facts about the fields and the template, computed once.
struct BatchPlan<'a> {
    fields: Vec<(&'a Field, FieldRole)>,
    page_heights: Vec<f32>,
    visible_boxes: Vec<Rect>,
    /// Template words of pages holding a gender region.
    words: HashMap<u32, Vec<TextRun>>,
}

impl<'a> BatchPlan<'a> {
    fn new(fields: &'a [Field], template: &TemplateDocument) -> Self {
        let fields: Vec<(&Field, FieldRole)> = fields
            .iter()
            .map(|field| (field, FieldRole::classify(field)))
            .collect();

        let mut words = HashMap::new();
        for (field, role) in &fields {
            if *role != FieldRole::GenderRegion || words.contains_key(&field.page) {
                continue;
            }
            match template.text_words(field.page) {
                Ok(found) => {
                    words.insert(field.page, found);
                }
                Err(e) => {
                    log::warn!("No text layer for page {}: {}", field.page, e);
                    words.insert(field.page, Vec::new());
                }
            }
        }

        Self {
            fields,
            page_heights: template.page_heights().to_vec(),
            visible_boxes: template.visible_boxes().to_vec(),
            words,
        }
    }

    fn page_height(&self, page: u32) -> Option<f32> {
        (page as usize)
            .checked_sub(1)
            .and_then(|index| self.page_heights.get(index))
            .copied()
    }

    fn visible_box(&self, page: u32, page_height: f32) -> Rect {
        (page as usize)
            .checked_sub(1)
            .and_then(|index| self.visible_boxes.get(index))
            .copied()
            .unwrap_or(Rect::new(0.0, 0.0, 0.0, page_height))
    }
}

pub struct Generator {
    template: Arc<Vec<u8>>,
    output: OutputDir,
    perception: PerceptionChain,
    prefix: String,
}

impl Generator {
    pub fn new(template: Arc<Vec<u8>>, output: OutputDir, perception: PerceptionChain) -> Self {
        Self {
            template,
            output,
            perception,
            prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Fill one document per sanitized row and persist it.
    ///
    /// A row whose document cannot be built, saved or written is recorded in
    /// [`GenerationReport::failed`] and the batch moves on. Two conditions
    /// abort the whole batch instead: an output directory that cannot be
    /// created, and template bytes that do not parse at all. Every row loads
    /// the same bytes, so the second would otherwise fail each row the same
    /// way; it surfaces once as [`GenerateError::Template`].
    pub async fn generate(
        &self,
        fields: &[Field],
        mappings: &[Mapping],
        rows: &[RawRow],
        headers: &[String],
    ) -> Result<GenerationReport, GenerateError> {
        self.output.ensure().await?;

        let plan = {
            let parsed = TemplateDocument::load(&self.template)?;
            BatchPlan::new(fields, &parsed)
        };
        let input_rows = rows.len();
        let rows = sanitize_rows(rows);

        let mut report = GenerationReport {
            input_rows,
            sanitized_rows: rows.len(),
            ..Default::default()
        };
        let mut perceived: HashMap<String, Vec<PerceivedWord>> = HashMap::new();

        for (index, row) in rows.iter().enumerate() {
            let ordinal = index + 1;
            match self
                .generate_row(ordinal, row, headers, mappings, &plan, &mut perceived)
                .await
            {
                Ok(path) => {
                    log::info!("Generated: {}", path.display());
                    report.files.push(path);
                }
                Err(e) => {
                    log::error!("Row {} failed: {}", ordinal, e);
                    report.failed.push(RowFailure {
                        ordinal,
                        message: e.to_string(),
                    });
                }
            }
        }

        log::info!("Generated {} PDF(s).", report.count());
        Ok(report)
    }

    async fn generate_row(
        &self,
        ordinal: usize,
        row: &[String],
        headers: &[String],
        mappings: &[Mapping],
        plan: &BatchPlan<'_>,
        perceived: &mut HashMap<String, Vec<PerceivedWord>>,
    ) -> Result<PathBuf, RowError> {
        let mut document = TemplateDocument::load(&self.template)?;
        let conditions = DerivedConditions::evaluate(row, headers);
        log::debug!(
            "Row {}: below_35={}, gender={:?}",
            ordinal,
            conditions.below_35,
            conditions.gender.as_str()
        );

        for (field, role) in &plan.fields {
            let Some(page_height) = plan.page_height(field.page) else {
                log::debug!(
                    "Skipping field {}: page {} is beyond the template",
                    field.id,
                    field.page
                );
                continue;
            };
            if !field.rect.is_valid() {
                log::debug!("Skipping field {}: empty rectangle", field.id);
                continue;
            }

            let area = field.rect.to_render_space(page_height);
            let ops = match role {
                FieldRole::Mapped => {
                    let value = resolve(find_mapping(mappings, &field.id), row, headers);
                    render_value(field, &area, &value)
                }
                FieldRole::GenderRegion => {
                    self.gender_region(field, page_height, &area, &conditions.gender, plan, perceived)
                        .await
                }
                derived => {
                    if conditions.holds(*derived) {
                        vec![derived_mark(&area)]
                    } else {
                        Vec::new()
                    }
                }
            };
            document.draw_all(field.page, &ops)?;
        }

        let bytes = document.save()?;
        let path = self
            .output
            .persist(&output_file_name(&self.prefix, ordinal), bytes)
            .await?;
        Ok(path)
    }

    /// Mark the printed "Male" or "Female" inside a gender region, if the
    /// template shows the word matching this row.
    async fn gender_region(
        &self,
        field: &Field,
        page_height: f32,
        area: &Rect,
        gender: &GenderCategory,
        plan: &BatchPlan<'_>,
        perceived: &mut HashMap<String, Vec<PerceivedWord>>,
    ) -> Vec<DrawOp> {
        if !matches!(gender, GenderCategory::Male | GenderCategory::Female) {
            return Vec::new();
        }

        if !perceived.contains_key(&field.id) {
            let runs = plan
                .words
                .get(&field.page)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let request = PerceptionRequest {
                template: &self.template,
                page: field.page,
                page_height,
                visible_box: plan.visible_box(field.page, page_height),
                region: field.rect,
                runs,
            };
            let words = self.perception.perceive(&request).await;
            perceived.insert(field.id.clone(), words);
        }

        let words = perceived
            .get(&field.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        match GenderEvidence::from_words(words).mark_position(gender, mark_anchor(area)) {
            Some((x, y)) => vec![derived_mark_at(x, y)],
            None => {
                log::debug!(
                    "Field {}: no printed word for {}",
                    field.id,
                    gender.as_str()
                );
                Vec::new()
            }
        }
    }
}
