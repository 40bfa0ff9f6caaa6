//! Runs one answer through every pipeline stage.
//!
//! Stages run strictly in order: validation, augmentation, passage search,
//! passage checks, the `meta` event, completion streaming with marker
//! substitution, and suggestions. Each event is sent to the live transport and
//! then queued for the response cache, so both observe the same order. A
//! disconnected client never stops the run; the cache still receives the
//! full response.
//!
//! Any stage failure except suggestions ends the response with exactly one
//! `error` event and no `done`. Suggestion failures fall back to a fixed list.

mod emitter;

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use verbatim_cache::{CacheWriter, ResponseCache};
use verbatim_config::Config;
use verbatim_stream::{EventSink, Heartbeat, PassageError, WireSender, validate_passages};
use verbatim_types::{Event, MetaPayload, Passage, ResponseId};

use self::emitter::Emitter;
use crate::collaborators::{Augmentation, Collaborators, CompletionRequest};
use crate::error::{ChatError, Classify, FailureKind, Stage};
use crate::health::{HealthReporter, ReportAppendFailures};
use crate::prompt::build_messages;
use crate::upstream::fallback_suggestions;

const ORCHESTRATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::orchestrator");

/// Client request for one answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnswerRequest {
    /// The user's question.
    pub question: String,
    /// Opaque hint forwarded to passage search.
    #[serde(default)]
    pub session_hint: Option<String>,
}

impl AnswerRequest {
    /// Builds a request without a session hint.
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            session_hint: None,
        }
    }
}

/// Per-response tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Period between heartbeat comments.
    pub heartbeat_interval: Duration,
    /// Longest accepted question, in characters.
    pub max_question_chars: usize,
}

impl OrchestratorSettings {
    /// Reads the settings from the daemon configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            max_question_chars: config.max_question_chars(),
        }
    }
}

/// Why a question was refused before any upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionRejected {
    /// The question was empty or whitespace.
    #[error("question is blank")]
    Blank,
    /// The question exceeded the configured length.
    #[error("question is {chars} characters; the limit is {limit}")]
    TooLong {
        /// Length of the trimmed question.
        chars: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl Classify for QuestionRejected {
    fn failure_kind(&self) -> FailureKind {
        FailureKind::Other
    }
}

impl Classify for PassageError {
    fn failure_kind(&self) -> FailureKind {
        FailureKind::Other
    }
}

/// How a response ended.
#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    /// The response ended with `done`.
    Completed,
    /// The response ended with `error`.
    Failed(ChatError),
}

impl ResponseOutcome {
    /// Whether the response ended with `done`.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Drives responses through the pipeline.
#[derive(Clone)]
pub struct Orchestrator {
    collaborators: Collaborators,
    cache: Arc<dyn ResponseCache>,
    reporter: Arc<dyn HealthReporter>,
    settings: OrchestratorSettings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Orchestrator")
            .field("collaborators", &self.collaborators)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        cache: Arc<dyn ResponseCache>,
        reporter: Arc<dyn HealthReporter>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            collaborators,
            cache,
            reporter,
            settings,
        }
    }

    /// The cache every response is recorded to.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.cache
    }

    /// Runs one response to completion.
    ///
    /// Returns once the terminal event has been sent and every cache append
    /// has been attempted.
    pub async fn run(
        &self,
        id: &ResponseId,
        request: &AnswerRequest,
        wire: WireSender,
    ) -> ResponseOutcome {
        self.reporter.response_started(id);
        let writer = CacheWriter::spawn_with(
            Arc::clone(&self.cache),
            id.clone(),
            Arc::new(ReportAppendFailures(Arc::clone(&self.reporter))),
        );
        let mut heartbeat = Heartbeat::start(wire.clone(), self.settings.heartbeat_interval);
        let mut emitter = Emitter::new(&wire, &writer);

        let result = self.answer(id, request, &mut emitter).await;
        heartbeat.stop();

        let outcome = match result {
            Ok(()) => {
                emitter.emit(Event::done());
                ResponseOutcome::Completed
            }
            Err(error) => {
                emitter.emit(error.to_event());
                ResponseOutcome::Failed(error)
            }
        };
        writer.finish().await;

        match &outcome {
            ResponseOutcome::Completed => self.reporter.response_completed(id),
            ResponseOutcome::Failed(error) => self.reporter.response_failed(id, error),
        }
        outcome
    }

    async fn answer<S>(
        &self,
        id: &ResponseId,
        request: &AnswerRequest,
        sink: &mut S,
    ) -> Result<(), ChatError>
    where
        S: EventSink + Send,
    {
        let question = validate_question(&request.question, self.settings.max_question_chars)
            .map_err(|error| ChatError::from_stage(Stage::Validation, error))?;

        let augmentation = self
            .collaborators
            .augmenter
            .augment(question)
            .await
            .map_err(|error| ChatError::from_stage(Stage::Augmentation, error))?;

        let passages = self
            .collaborators
            .search
            .search(&augmentation.query, request.session_hint.as_deref())
            .await
            .map_err(|error| ChatError::from_stage(Stage::Search, error))?;
        validate_passages(&passages).map_err(|error| ChatError::from_stage(Stage::Quotes, error))?;

        sink.emit(meta_event(&augmentation, passages.clone()));

        let fragments = self
            .collaborators
            .completion
            .stream(CompletionRequest {
                messages: build_messages(question, &passages),
                ..CompletionRequest::default()
            })
            .await
            .map_err(|error| ChatError::from_stage(Stage::Streaming, error))?;
        let outcome = verbatim_stream::process(fragments, &passages, sink)
            .await
            .map_err(|error| ChatError::from_stage(Stage::Streaming, error))?;
        debug!(
            target: ORCHESTRATOR_TARGET,
            response_id = %id,
            output_chars = outcome.full_output.chars().count(),
            usage = ?outcome.usage,
            "completion stream finished"
        );

        let items = self
            .suggestions(id, question, &outcome.full_output, &augmentation.intent)
            .await;
        sink.emit(Event::suggestions(items));
        Ok(())
    }

    async fn suggestions(
        &self,
        id: &ResponseId,
        question: &str,
        answer: &str,
        intent: &str,
    ) -> Vec<String> {
        match self
            .collaborators
            .suggestions
            .suggest(question, answer, intent)
            .await
        {
            Ok(items) if !items.is_empty() => items,
            Ok(_) => {
                self.degrade(id, EmptySuggestions);
                fallback_suggestions(intent)
            }
            Err(error) => {
                self.degrade(id, error);
                fallback_suggestions(intent)
            }
        }
    }

    fn degrade<E>(&self, id: &ResponseId, cause: E)
    where
        E: StdError + Send + Sync + 'static,
    {
        let error = ChatError::with_cause(Stage::Suggestions.code(), cause);
        self.reporter.suggestions_degraded(id, &error);
    }
}

#[derive(Debug, Error)]
#[error("suggestion generator returned no items")]
struct EmptySuggestions;

/// Trims `question` and checks it against `limit`.
///
/// # Errors
///
/// Returns [`QuestionRejected`] for blank or overlong questions.
pub fn validate_question(question: &str, limit: usize) -> Result<&str, QuestionRejected> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(QuestionRejected::Blank);
    }
    let chars = trimmed.chars().count();
    if chars > limit {
        return Err(QuestionRejected::TooLong { chars, limit });
    }
    Ok(trimmed)
}

fn meta_event(augmentation: &Augmentation, quotes: Vec<Passage>) -> Event {
    let confidence = if augmentation.confidence.is_finite() {
        augmentation.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    Event::Meta(MetaPayload {
        quotes,
        intent: augmentation.intent.clone(),
        confidence,
        concepts: augmentation.concepts.clone(),
    })
}

#[cfg(test)]
mod tests;
