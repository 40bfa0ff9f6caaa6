use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use mockall::mock;
use rstest::{fixture, rstest};
use tokio::sync::mpsc::UnboundedReceiver;

use verbatim_cache::{MemoryResponseCache, ResponseCache};
use verbatim_stream::WireSender;
use verbatim_stream::wire::encode_cached;
use verbatim_types::{CachedEvent, EventName, Fragment, Passage, ResponseId};

use super::*;
use crate::collaborators::{
    CompletionProvider, FragmentStream, PassageSearch, QueryAugmenter, SearchError,
    SuggestionGenerator, UpstreamError,
};
use crate::error::ErrorCode;
use crate::tests::support::{HealthEvent, RecordingHealthReporter};

mock! {
    Augmenter {}

    #[async_trait]
    impl QueryAugmenter for Augmenter {
        async fn augment(&self, question: &str) -> Result<Augmentation, UpstreamError>;
    }
}

mock! {
    Suggestions {}

    #[async_trait]
    impl SuggestionGenerator for Suggestions {
        async fn suggest(
            &self,
            question: &str,
            answer: &str,
            intent: &str,
        ) -> Result<Vec<String>, UpstreamError>;
    }
}

enum SearchScript {
    Passages(Vec<Passage>),
    Fail(fn() -> SearchError),
}

struct ScriptedSearch(SearchScript);

#[async_trait]
impl PassageSearch for ScriptedSearch {
    async fn search(
        &self,
        _query: &str,
        _session_hint: Option<&str>,
    ) -> Result<Vec<Passage>, SearchError> {
        match &self.0 {
            SearchScript::Passages(passages) => Ok(passages.clone()),
            SearchScript::Fail(make) => Err(make()),
        }
    }
}

#[derive(Default)]
struct ScriptedCompletion {
    fragments: Vec<&'static str>,
    fails_mid_stream: Option<fn() -> UpstreamError>,
    fails_to_start: Option<fn() -> UpstreamError>,
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn stream(&self, _request: CompletionRequest) -> Result<FragmentStream, UpstreamError> {
        if let Some(make) = self.fails_to_start {
            return Err(make());
        }
        let mut items: Vec<Result<Fragment, UpstreamError>> = self
            .fragments
            .iter()
            .map(|text| Ok(Fragment::text(*text)))
            .collect();
        if let Some(make) = self.fails_mid_stream {
            items.push(Err(make()));
        }
        Ok(stream::iter(items).boxed())
    }
}

fn ra_passage() -> Passage {
    Passage::new("1.1", "Ra: I am Ra. Example.", "u")
}

fn general_augmenter() -> MockAugmenter {
    let mut augmenter = MockAugmenter::new();
    augmenter.expect_augment().returning(|question| {
        Ok(Augmentation {
            query: question.to_owned(),
            intent: String::from("general"),
            confidence: 0.8,
            concepts: vec![String::from("identity")],
        })
    });
    augmenter
}

fn fixed_suggestions() -> MockSuggestions {
    let mut suggestions = MockSuggestions::new();
    suggestions
        .expect_suggest()
        .returning(|_, _, _| Ok(vec![String::from("Who is Ra?")]));
    suggestions
}

struct Harness {
    cache: Arc<MemoryResponseCache>,
    reporter: Arc<RecordingHealthReporter>,
    id: ResponseId,
}

#[fixture]
fn harness() -> Harness {
    Harness {
        cache: Arc::new(MemoryResponseCache::new(16, Duration::from_secs(60))),
        reporter: Arc::new(RecordingHealthReporter::default()),
        id: ResponseId::parse("response-1").expect("valid id"),
    }
}

impl Harness {
    fn orchestrator(
        &self,
        augmenter: MockAugmenter,
        search: SearchScript,
        completion: ScriptedCompletion,
        suggestions: MockSuggestions,
    ) -> Orchestrator {
        Orchestrator::new(
            Collaborators {
                augmenter: Arc::new(augmenter),
                search: Arc::new(ScriptedSearch(search)),
                completion: Arc::new(completion),
                suggestions: Arc::new(suggestions),
            },
            self.cache.clone(),
            self.reporter.clone(),
            OrchestratorSettings {
                heartbeat_interval: Duration::from_secs(60),
                max_question_chars: 40,
            },
        )
    }

    async fn run(
        &self,
        orchestrator: &Orchestrator,
        question: &str,
    ) -> (ResponseOutcome, Vec<Bytes>) {
        let (wire, mut frames) = WireSender::channel();
        let outcome = orchestrator
            .run(&self.id, &AnswerRequest::new(question), wire)
            .await;
        (outcome, drain(&mut frames))
    }

    async fn cached(&self) -> Vec<CachedEvent> {
        self.cache
            .get(&self.id)
            .await
            .expect("memory cache never fails")
            .map(|log| log.into_events())
            .unwrap_or_default()
    }
}

fn drain(frames: &mut UnboundedReceiver<Bytes>) -> Vec<Bytes> {
    let mut collected = Vec::new();
    while let Ok(frame) = frames.try_recv() {
        collected.push(frame);
    }
    collected
}

fn names(events: &[CachedEvent]) -> Vec<EventName> {
    events.iter().map(|entry| entry.event).collect()
}

fn error_code(events: &[CachedEvent]) -> Option<String> {
    events
        .iter()
        .find(|entry| entry.event == EventName::Error)
        .and_then(|entry| entry.data.get("code"))
        .and_then(|code| code.as_str())
        .map(str::to_owned)
}

#[rstest]
#[tokio::test]
async fn answers_stream_in_stage_order(harness: Harness) {
    let orchestrator = harness.orchestrator(
        general_augmenter(),
        SearchScript::Passages(vec![ra_passage()]),
        ScriptedCompletion {
            fragments: vec!["Here: ", "{{QUOTE:", "1}}", " end."],
            ..ScriptedCompletion::default()
        },
        fixed_suggestions(),
    );

    let (outcome, frames) = harness.run(&orchestrator, "  Who are you?  ").await;
    assert!(outcome.is_completed());

    let cached = harness.cached().await;
    assert_eq!(
        names(&cached),
        vec![
            EventName::Meta,
            EventName::Chunk,
            EventName::Chunk,
            EventName::Chunk,
            EventName::Suggestions,
            EventName::Done,
        ]
    );
    let replayed: Vec<Bytes> = cached.iter().map(encode_cached).collect();
    assert_eq!(frames, replayed);

    let quote = cached.get(2).expect("quote chunk");
    assert_eq!(
        quote.data,
        serde_json::json!({
            "type": "quote",
            "text": "Ra: I am Ra. Example.",
            "reference": "1.1",
            "url": "u"
        })
    );
    assert_eq!(
        harness.reporter.events(),
        vec![
            HealthEvent::ResponseStarted(harness.id.clone()),
            HealthEvent::ResponseCompleted(harness.id.clone()),
        ]
    );
}

#[rstest]
#[case(|| SearchError::RateLimited, "RATE_LIMITED")]
#[case(|| SearchError::Embedding { message: String::from("model offline") }, "EMBEDDING_FAILED")]
#[case(|| SearchError::Failed { message: String::from("index gone") }, "SEARCH_FAILED")]
#[tokio::test]
async fn search_failures_end_with_one_error(
    harness: Harness,
    #[case] failure: fn() -> SearchError,
    #[case] expected: &str,
) {
    let orchestrator = harness.orchestrator(
        general_augmenter(),
        SearchScript::Fail(failure),
        ScriptedCompletion::default(),
        MockSuggestions::new(),
    );

    let (outcome, _) = harness.run(&orchestrator, "Who are you?").await;
    assert!(!outcome.is_completed());

    let cached = harness.cached().await;
    assert_eq!(names(&cached), vec![EventName::Error]);
    assert_eq!(error_code(&cached).as_deref(), Some(expected));
    assert!(
        !harness
            .cache
            .get(&harness.id)
            .await
            .expect("memory cache never fails")
            .expect("log present")
            .complete()
    );
}

#[rstest]
#[tokio::test]
async fn augmentation_failure_skips_search(harness: Harness) {
    let mut augmenter = MockAugmenter::new();
    augmenter
        .expect_augment()
        .times(1)
        .returning(|_| Err(UpstreamError::Status { status: 502 }));
    let orchestrator = harness.orchestrator(
        augmenter,
        SearchScript::Fail(|| panic!("search must not run")),
        ScriptedCompletion::default(),
        MockSuggestions::new(),
    );

    let (outcome, _) = harness.run(&orchestrator, "Who are you?").await;
    match outcome {
        ResponseOutcome::Failed(error) => assert_eq!(error.code(), ErrorCode::AugmentationFailed),
        ResponseOutcome::Completed => panic!("augmentation failure should fail the response"),
    }
}

#[rstest]
#[case("")]
#[case("   \n\t")]
#[case("This question is far too long to be accepted by the limit")]
#[tokio::test]
async fn invalid_questions_never_reach_collaborators(harness: Harness, #[case] question: &str) {
    let orchestrator = harness.orchestrator(
        MockAugmenter::new(),
        SearchScript::Fail(|| panic!("search must not run")),
        ScriptedCompletion::default(),
        MockSuggestions::new(),
    );

    harness.run(&orchestrator, question).await;

    let cached = harness.cached().await;
    assert_eq!(names(&cached), vec![EventName::Error]);
    assert_eq!(error_code(&cached).as_deref(), Some("VALIDATION_ERROR"));
    assert_eq!(
        harness.reporter.events().last(),
        Some(&HealthEvent::ResponseFailed(
            harness.id.clone(),
            ErrorCode::ValidationError
        ))
    );
}

#[rstest]
#[tokio::test]
async fn corrupt_passages_fail_before_meta(harness: Harness) {
    let orchestrator = harness.orchestrator(
        general_augmenter(),
        SearchScript::Passages(vec![ra_passage(), Passage::new("2.1", "  ", "u2")]),
        ScriptedCompletion::default(),
        MockSuggestions::new(),
    );

    harness.run(&orchestrator, "Who are you?").await;

    let cached = harness.cached().await;
    assert_eq!(names(&cached), vec![EventName::Error]);
    assert_eq!(error_code(&cached).as_deref(), Some("QUOTE_PROCESSING_FAILED"));
}

#[rstest]
#[tokio::test]
async fn rate_limited_completion_fails_after_meta(harness: Harness) {
    let orchestrator = harness.orchestrator(
        general_augmenter(),
        SearchScript::Passages(vec![ra_passage()]),
        ScriptedCompletion {
            fails_to_start: Some(|| UpstreamError::RateLimited),
            ..ScriptedCompletion::default()
        },
        MockSuggestions::new(),
    );

    harness.run(&orchestrator, "Who are you?").await;

    let cached = harness.cached().await;
    assert_eq!(names(&cached), vec![EventName::Meta, EventName::Error]);
    assert_eq!(error_code(&cached).as_deref(), Some("RATE_LIMITED"));
}

#[rstest]
#[tokio::test]
async fn mid_stream_failure_keeps_partial_text(harness: Harness) {
    let orchestrator = harness.orchestrator(
        general_augmenter(),
        SearchScript::Passages(vec![ra_passage()]),
        ScriptedCompletion {
            fragments: vec!["Partial ", "answer {{QUO"],
            fails_mid_stream: Some(|| UpstreamError::Stream {
                message: String::from("connection reset"),
            }),
            ..ScriptedCompletion::default()
        },
        MockSuggestions::new(),
    );

    harness.run(&orchestrator, "Who are you?").await;

    let cached = harness.cached().await;
    assert_eq!(
        names(&cached),
        vec![EventName::Meta, EventName::Chunk, EventName::Error]
    );
    let partial = cached.get(1).expect("partial chunk");
    assert_eq!(
        partial.data,
        serde_json::json!({"type": "text", "content": "Partial answer {{QUO"})
    );
    assert_eq!(error_code(&cached).as_deref(), Some("STREAM_FAILED"));
}

#[rstest]
#[case::generator_error(Err(UpstreamError::RateLimited))]
#[case::generator_empty(Ok(Vec::new()))]
#[tokio::test]
async fn suggestion_failures_fall_back_silently(
    harness: Harness,
    #[case] reply: Result<Vec<String>, UpstreamError>,
) {
    let mut suggestions = MockSuggestions::new();
    suggestions.expect_suggest().return_once(move |_, _, _| reply);
    let orchestrator = harness.orchestrator(
        general_augmenter(),
        SearchScript::Passages(vec![ra_passage()]),
        ScriptedCompletion {
            fragments: vec!["An answer."],
            ..ScriptedCompletion::default()
        },
        suggestions,
    );

    let (outcome, _) = harness.run(&orchestrator, "Who are you?").await;
    assert!(outcome.is_completed());

    let cached = harness.cached().await;
    assert_eq!(error_code(&cached), None);
    let offered = cached
        .iter()
        .find(|entry| entry.event == EventName::Suggestions)
        .expect("suggestions event");
    assert_eq!(
        offered.data,
        serde_json::json!({"items": fallback_suggestions("general")})
    );
    assert!(
        harness
            .reporter
            .events()
            .contains(&HealthEvent::SuggestionsDegraded(harness.id.clone()))
    );
}

#[rstest]
#[tokio::test]
async fn disconnected_client_still_fills_the_cache(harness: Harness) {
    let orchestrator = harness.orchestrator(
        general_augmenter(),
        SearchScript::Passages(vec![ra_passage()]),
        ScriptedCompletion {
            fragments: vec!["Quoting {{QUOTE:1:s2:s2}} now."],
            ..ScriptedCompletion::default()
        },
        fixed_suggestions(),
    );
    let (wire, frames) = WireSender::channel();
    drop(frames);

    let outcome = orchestrator
        .run(&harness.id, &AnswerRequest::new("Who are you?"), wire)
        .await;
    assert!(outcome.is_completed());

    let log = harness
        .cache
        .get(&harness.id)
        .await
        .expect("memory cache never fails")
        .expect("log present");
    assert!(log.complete());
    assert_eq!(log.len(), 6);
}

#[rstest]
#[case(f32::NAN, 0.0)]
#[case(f32::INFINITY, 0.0)]
#[case(1.5, 1.0)]
#[case(0.25, 0.25)]
fn meta_confidence_is_finite_and_bounded(#[case] raw: f32, #[case] expected: f32) {
    let augmentation = Augmentation {
        query: String::from("q"),
        intent: String::from("general"),
        confidence: raw,
        concepts: Vec::new(),
    };
    match meta_event(&augmentation, Vec::new()) {
        Event::Meta(meta) => assert!((meta.confidence - expected).abs() < f32::EPSILON),
        other => panic!("expected meta event, got {other:?}"),
    }
}

#[rstest]
#[case("  spaced  ", 10, Ok("spaced"))]
#[case("", 10, Err(QuestionRejected::Blank))]
#[case("ééééé", 4, Err(QuestionRejected::TooLong { chars: 5, limit: 4 }))]
#[case("ééééé", 5, Ok("ééééé"))]
fn question_validation_counts_characters(
    #[case] question: &str,
    #[case] limit: usize,
    #[case] expected: Result<&str, QuestionRejected>,
) {
    assert_eq!(validate_question(question, limit), expected);
}
