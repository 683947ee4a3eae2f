use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::*;

struct FixedSource {
    calls: AtomicUsize,
    answer: fn() -> Result<Option<Vec<PerceivedWord>>, PerceptionError>,
}

impl FixedSource {
    fn new(answer: fn() -> Result<Option<Vec<PerceivedWord>>, PerceptionError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            answer,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WordSource for FixedSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn words(
        &self,
        _request: &PerceptionRequest<'_>,
    ) -> Result<Option<Vec<PerceivedWord>>, PerceptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.answer)()
    }
}

fn request(runs: &[TextRun]) -> PerceptionRequest<'_> {
    PerceptionRequest {
        template: b"",
        page: 1,
        page_height: 792.0,
        visible_box: Rect::new(0.0, 0.0, 612.0, 792.0),
        region: Rect::new(100.0, 80.0, 120.0, 20.0),
        runs,
    }
}

fn run(text: &str, x: f32, y: f32) -> TextRun {
    TextRun {
        text: text.to_string(),
        x,
        y,
    }
}

#[tokio::test]
async fn first_source_with_words_wins() {
    let first = FixedSource::new(|| Ok(Some(vec![PerceivedWord::new("Male", None)])));
    let second = FixedSource::new(|| Ok(Some(vec![PerceivedWord::new("Female", None)])));
    let chain = PerceptionChain::new()
        .with_source(first.clone())
        .with_source(second.clone());

    let words = chain.perceive(&request(&[])).await;

    assert_eq!(words, vec![PerceivedWord::new("Male", None)]);
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 0);
}

#[tokio::test]
async fn empty_and_failing_sources_fall_through() {
    let empty = FixedSource::new(|| Ok(Some(Vec::new())));
    let failing = FixedSource::new(|| Err(PerceptionError::Decode("bad".to_string())));
    let last = FixedSource::new(|| Ok(Some(vec![PerceivedWord::new("Female", None)])));
    let chain = PerceptionChain::new()
        .with_source(empty.clone())
        .with_source(failing.clone())
        .with_source(last.clone());

    let words = chain.perceive(&request(&[])).await;

    assert_eq!(words.len(), 1);
    assert_eq!((empty.calls(), failing.calls(), last.calls()), (1, 1, 1));
}

#[tokio::test]
async fn exhausted_chain_sees_nothing() {
    let failing = FixedSource::new(|| Err(PerceptionError::Decode("bad".to_string())));
    let chain = PerceptionChain::new().with_source(failing);
    assert!(chain.perceive(&request(&[])).await.is_empty());
}

#[tokio::test]
async fn text_layer_matches_runs_inside_region() {
    // Region (100, 80, 120x20) on a 792pt page spans y 692..712 in render space.
    let runs = vec![
        run("Male", 105.0, 695.0),
        run("Female", 160.0, 712.5),
        run("Elsewhere", 400.0, 100.0),
    ];
    let words = TextLayerSource::default()
        .words(&request(&runs))
        .await
        .expect("words")
        .expect("some");

    let texts: Vec<&str> = words.iter().map(|word| word.text.as_str()).collect();
    assert_eq!(texts, vec!["Male", "Female"]);
    assert_eq!(words[0].position, Some((105.0, 695.0)));
}

#[tokio::test]
async fn text_layer_without_hits_returns_none() {
    let runs = vec![run("Male", 10.0, 10.0)];
    let words = TextLayerSource::default()
        .words(&request(&runs))
        .await
        .expect("words");
    assert!(words.is_none());
}

#[test]
fn evidence_distinguishes_male_from_female() {
    let evidence = GenderEvidence::from_words(&[PerceivedWord::new("Female", Some((5.0, 6.0)))]);
    assert!(!evidence.has_male);
    assert!(evidence.has_female);
    assert_eq!(evidence.female_at, Some((5.0, 6.0)));
}

#[test]
fn evidence_joins_words_before_matching() {
    let words = vec![
        PerceivedWord::new("Gender:", Some((1.0, 1.0))),
        PerceivedWord::new("MALE", Some((20.0, 1.0))),
        PerceivedWord::new("/FEMALE", Some((50.0, 1.0))),
    ];
    let evidence = GenderEvidence::from_words(&words);
    assert!(evidence.has_male);
    assert!(evidence.has_female);
    assert_eq!(evidence.male_at, Some((20.0, 1.0)));
    assert_eq!(evidence.female_at, Some((50.0, 1.0)));
}

#[test]
fn mark_position_follows_gender_and_evidence() {
    let evidence = GenderEvidence {
        has_male: true,
        has_female: true,
        male_at: Some((10.0, 20.0)),
        female_at: None,
    };
    let fallback = (1.0, 2.0);

    assert_eq!(
        evidence.mark_position(&GenderCategory::Male, fallback),
        Some((10.0, 20.0))
    );
    assert_eq!(
        evidence.mark_position(&GenderCategory::Female, fallback),
        Some(fallback)
    );
    assert_eq!(
        evidence.mark_position(&GenderCategory::Other("X".to_string()), fallback),
        None
    );
    assert_eq!(
        GenderEvidence::default().mark_position(&GenderCategory::Male, fallback),
        None
    );
}
