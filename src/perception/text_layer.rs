use async_trait::async_trait;

use super::{PerceivedWord, PerceptionError, PerceptionRequest, WordSource};

/// Slack around the region when matching run anchors, in points.
pub const TEXT_LAYER_TOLERANCE: f32 = 1.0;

/// Reads the template's embedded text runs.
#[derive(Debug, Clone, Copy)]
pub struct TextLayerSource {
    tolerance: f32,
}

impl Default for TextLayerSource {
    fn default() -> Self {
        Self {
            tolerance: TEXT_LAYER_TOLERANCE,
        }
    }
}

#[async_trait]
impl WordSource for TextLayerSource {
    fn name(&self) -> &'static str {
        "text layer"
    }

    async fn words(
        &self,
        request: &PerceptionRequest<'_>,
    ) -> Result<Option<Vec<PerceivedWord>>, PerceptionError> {
        let area = request.region.to_render_space(request.page_height);
        let words: Vec<PerceivedWord> = request
            .runs
            .iter()
            .filter(|run| area.contains(run.x, run.y, self.tolerance))
            .map(|run| PerceivedWord::new(run.text.clone(), Some((run.x, run.y))))
            .collect();

        Ok((!words.is_empty()).then_some(words))
    }
}
