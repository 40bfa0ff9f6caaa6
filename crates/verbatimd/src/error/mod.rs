//! Client-facing error taxonomy.
//!
//! Every stage failure is classified exactly once, when it crosses into the
//! orchestrator, into one [`ErrorCode`]. Each code maps to a single fixed
//! [`ErrorDescriptor`]; the client only ever sees that sentence and the retry
//! hint. The originating error is kept on [`ChatError`] for logs.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use verbatim_types::{ErrorPayload, Event};

/// Failure classes reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The question could not be prepared for search.
    AugmentationFailed,
    /// The question could not be embedded for similarity search.
    EmbeddingFailed,
    /// Passage search failed.
    SearchFailed,
    /// The completion stream failed or could not be started.
    StreamFailed,
    /// Passages could not be used for quoting; the answer may be partial.
    QuoteProcessingFailed,
    /// Suggestion generation failed. Never sent to clients.
    SuggestionsFailed,
    /// An upstream service throttled the request.
    RateLimited,
    /// The request itself was unacceptable.
    ValidationError,
    /// Anything not otherwise classified.
    Unknown,
}

/// User-facing rendering of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDescriptor {
    /// Single natural-language sentence shown to the user.
    pub user_message: &'static str,
    /// Whether the client should offer a retry.
    pub retryable: bool,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::AugmentationFailed,
        Self::EmbeddingFailed,
        Self::SearchFailed,
        Self::StreamFailed,
        Self::QuoteProcessingFailed,
        Self::SuggestionsFailed,
        Self::RateLimited,
        Self::ValidationError,
        Self::Unknown,
    ];

    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AugmentationFailed => "AUGMENTATION_FAILED",
            Self::EmbeddingFailed => "EMBEDDING_FAILED",
            Self::SearchFailed => "SEARCH_FAILED",
            Self::StreamFailed => "STREAM_FAILED",
            Self::QuoteProcessingFailed => "QUOTE_PROCESSING_FAILED",
            Self::SuggestionsFailed => "SUGGESTIONS_FAILED",
            Self::RateLimited => "RATE_LIMITED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// The fixed message and retry hint for this code.
    #[must_use]
    pub const fn descriptor(self) -> ErrorDescriptor {
        let (user_message, retryable) = match self {
            Self::AugmentationFailed => (
                "We couldn't prepare your question. Please try again.",
                true,
            ),
            Self::EmbeddingFailed => (
                "We couldn't analyse your question. Please try again.",
                true,
            ),
            Self::SearchFailed => (
                "We couldn't search the source material. Please try again.",
                true,
            ),
            Self::StreamFailed => (
                "The answer was interrupted before it finished. Please try again.",
                true,
            ),
            Self::QuoteProcessingFailed => (
                "Some quotations could not be verified, so this answer may be incomplete.",
                false,
            ),
            Self::SuggestionsFailed => ("Follow-up suggestions are unavailable.", false),
            Self::RateLimited => (
                "Too many questions are being asked right now. Please wait a moment and try again.",
                true,
            ),
            Self::ValidationError => (
                "Your question could not be processed. Please check it and try again.",
                false,
            ),
            Self::Unknown => ("Something went wrong. Please try again.", true),
        };
        ErrorDescriptor {
            user_message,
            retryable,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Pipeline stage in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Request validation.
    Validation,
    /// Query augmentation.
    Augmentation,
    /// Passage search.
    Search,
    /// Passage list checks before streaming.
    Quotes,
    /// Completion streaming and marker substitution.
    Streaming,
    /// Follow-up suggestion generation.
    Suggestions,
}

impl Stage {
    /// Code used when the failure carries no more specific classification.
    #[must_use]
    pub const fn code(self) -> ErrorCode {
        match self {
            Self::Validation => ErrorCode::ValidationError,
            Self::Augmentation => ErrorCode::AugmentationFailed,
            Self::Search => ErrorCode::SearchFailed,
            Self::Quotes => ErrorCode::QuoteProcessingFailed,
            Self::Streaming => ErrorCode::StreamFailed,
            Self::Suggestions => ErrorCode::SuggestionsFailed,
        }
    }
}

/// Cross-stage classification a collaborator error can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The collaborator was throttled.
    RateLimited,
    /// Query embedding failed inside the search service.
    Embedding,
    /// No classification beyond the stage.
    Other,
}

/// Errors that can be normalised into the taxonomy.
pub trait Classify {
    /// Classification of this failure.
    fn failure_kind(&self) -> FailureKind;
}

/// A classified failure with its diagnostic cause.
#[derive(Clone, thiserror::Error)]
#[error("{code}")]
pub struct ChatError {
    code: ErrorCode,
    #[source]
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl fmt::Debug for ChatError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ChatError")
            .field("code", &self.code)
            .field("cause", &self.cause.as_ref().map(ToString::to_string))
            .finish()
    }
}

impl ChatError {
    /// Builds an error without a cause.
    #[must_use]
    pub const fn new(code: ErrorCode) -> Self {
        Self { code, cause: None }
    }

    /// Builds an error carrying `cause` for diagnostics.
    #[must_use]
    pub fn with_cause<E>(code: ErrorCode, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            code,
            cause: Some(Arc::new(cause)),
        }
    }

    /// Normalises a collaborator failure raised in `stage`.
    ///
    /// Rate limiting wins over the stage, and embedding failures reported by
    /// the search service keep their own code.
    #[must_use]
    pub fn from_stage<E>(stage: Stage, cause: E) -> Self
    where
        E: Classify + StdError + Send + Sync + 'static,
    {
        let code = match cause.failure_kind() {
            FailureKind::RateLimited => ErrorCode::RateLimited,
            FailureKind::Embedding => ErrorCode::EmbeddingFailed,
            FailureKind::Other => stage.code(),
        };
        Self::with_cause(code, cause)
    }

    /// Taxonomy code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Sentence shown to the user.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        self.code.descriptor().user_message
    }

    /// Whether the client should offer a retry.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        self.code.descriptor().retryable
    }

    /// Diagnostic cause, never sent to clients.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Client payload for the terminal `error` event.
    #[must_use]
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code.as_str().to_owned(),
            message: self.user_message().to_owned(),
            retryable: self.retryable(),
        }
    }

    /// Terminal `error` event for this failure.
    #[must_use]
    pub fn to_event(&self) -> Event {
        Event::Error(self.to_payload())
    }
}
