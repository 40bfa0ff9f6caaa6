//! Interfaces to the services the answer pipeline depends on.
//!
//! Query augmentation, passage search, completion streaming, and suggestion
//! generation are external concerns. The orchestrator only sees these traits;
//! HTTP-backed implementations live in [`crate::upstream`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;

use verbatim_types::{Fragment, Passage};

use crate::error::{Classify, FailureKind};

/// Result of preparing a question for search.
#[derive(Debug, Clone, PartialEq)]
pub struct Augmentation {
    /// Query sent to passage search.
    pub query: String,
    /// Intent assigned to the question.
    pub intent: String,
    /// Confidence in `intent`, between 0 and 1.
    pub confidence: f32,
    /// Concepts associated with the question.
    pub concepts: Vec<String>,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions to the model.
    System,
    /// The asking user.
    User,
    /// Prior model output.
    Assistant,
}

/// One message of a chat completion prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Builds a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Builds a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Prompt for a streamed completion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionRequest {
    /// Conversation sent to the model.
    pub messages: Vec<ChatMessage>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

/// Upstream fragments as they arrive.
pub type FragmentStream = BoxStream<'static, Result<Fragment, UpstreamError>>;

/// Failures of augmentation, completion, and suggestion services.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The service throttled the request.
    #[error("upstream service rate limited the request")]
    RateLimited,
    /// The request could not be sent or its response not read.
    #[error("upstream request failed: {0}")]
    Request(#[source] reqwest::Error),
    /// The service answered with an unexpected status.
    #[error("upstream service returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
    /// The event stream broke mid-response.
    #[error("upstream stream failed: {message}")]
    Stream {
        /// Transport description of the failure.
        message: String,
    },
    /// The service answered with something unusable.
    #[error("upstream response was unusable: {message}")]
    InvalidResponse {
        /// What was wrong with the response.
        message: String,
    },
}

impl Classify for UpstreamError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::RateLimited => FailureKind::RateLimited,
            _ => FailureKind::Other,
        }
    }
}

/// Failures of the passage search service.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The service throttled the request.
    #[error("passage search rate limited the request")]
    RateLimited,
    /// The service could not embed the query.
    #[error("query embedding failed: {message}")]
    Embedding {
        /// Service-provided detail.
        message: String,
    },
    /// The search itself failed.
    #[error("passage search failed: {message}")]
    Failed {
        /// Service-provided detail.
        message: String,
    },
    /// The request could not be sent or its response not read.
    #[error("passage search request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl Classify for SearchError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::RateLimited => FailureKind::RateLimited,
            Self::Embedding { .. } => FailureKind::Embedding,
            Self::Failed { .. } | Self::Request(_) => FailureKind::Other,
        }
    }
}

/// Turns a raw question into a search query plus classification.
#[async_trait]
pub trait QueryAugmenter: Send + Sync {
    /// Prepares `question` for search.
    async fn augment(&self, question: &str) -> Result<Augmentation, UpstreamError>;
}

/// Retrieves verified passages for a query.
#[async_trait]
pub trait PassageSearch: Send + Sync {
    /// Returns passages in relevance order.
    async fn search(
        &self,
        query: &str,
        session_hint: Option<&str>,
    ) -> Result<Vec<Passage>, SearchError>;
}

/// Streams model output.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Starts a streamed completion.
    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, UpstreamError>;
}

/// Proposes follow-up questions.
#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    /// Suggests follow-ups for an answered question.
    async fn suggest(
        &self,
        question: &str,
        answer: &str,
        intent: &str,
    ) -> Result<Vec<String>, UpstreamError>;
}

/// The full set of services one response needs.
#[derive(Clone)]
pub struct Collaborators {
    /// Query augmentation.
    pub augmenter: Arc<dyn QueryAugmenter>,
    /// Passage search.
    pub search: Arc<dyn PassageSearch>,
    /// Completion streaming.
    pub completion: Arc<dyn CompletionProvider>,
    /// Suggestion generation.
    pub suggestions: Arc<dyn SuggestionGenerator>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
