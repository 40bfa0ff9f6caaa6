//! Structured events emitted to clients.
//!
//! Every response is a totally ordered sequence of events. The live transport
//! and the response cache observe the same sequence; the cache stores each
//! event as a [`CachedEvent`](crate::CachedEvent) so replays are byte-for-byte
//! identical to the original stream.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::passage::Passage;

/// Discriminant naming each event on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    /// Request metadata: passages, intent, and concepts.
    Meta,
    /// A block of answer content.
    Chunk,
    /// Follow-up suggestions.
    Suggestions,
    /// Terminal failure.
    Error,
    /// Terminal success.
    Done,
}

impl EventName {
    /// Returns the name written to the `event:` line of a frame.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Chunk => "chunk",
            Self::Suggestions => "suggestions",
            Self::Error => "error",
            Self::Done => "done",
        }
    }

    /// Reports whether no further events may follow this one.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Done)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Payload of the `meta` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaPayload {
    /// Passages available to the answer, in marker order.
    pub quotes: Vec<Passage>,
    /// Intent assigned to the question by the classifier.
    pub intent: String,
    /// Classifier confidence in `intent`.
    pub confidence: f32,
    /// Concepts associated with the question.
    pub concepts: Vec<String>,
}

/// Payload of a `chunk` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkPayload {
    /// Freely generated prose.
    Text {
        /// Prose content; never blank.
        content: String,
    },
    /// A verified excerpt substituted for a quote marker.
    Quote {
        /// Excerpt text, possibly trimmed to a sentence range.
        text: String,
        /// Reference of the quoted passage.
        reference: String,
        /// Location of the quoted passage.
        url: String,
    },
}

/// Payload of the `suggestions` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionsPayload {
    /// Suggested follow-up questions.
    pub items: Vec<String>,
}

/// Payload of the `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Taxonomy code identifying the failure class.
    pub code: String,
    /// Natural-language sentence shown to the user.
    pub message: String,
    /// Whether the client should offer a retry.
    pub retryable: bool,
}

/// Payload of the `done` event; always serialised as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonePayload {}

/// A single event in a response stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// Request metadata, sent before any content.
    Meta(MetaPayload),
    /// Answer content.
    Chunk(ChunkPayload),
    /// Follow-up suggestions.
    Suggestions(SuggestionsPayload),
    /// Terminal failure.
    Error(ErrorPayload),
    /// Terminal success.
    Done(DonePayload),
}

impl Event {
    /// Builds a prose chunk.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Chunk(ChunkPayload::Text {
            content: content.into(),
        })
    }

    /// Builds a quote chunk.
    #[must_use]
    pub fn quote(
        text: impl Into<String>,
        reference: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::Chunk(ChunkPayload::Quote {
            text: text.into(),
            reference: reference.into(),
            url: url.into(),
        })
    }

    /// Builds a suggestions event.
    #[must_use]
    pub const fn suggestions(items: Vec<String>) -> Self {
        Self::Suggestions(SuggestionsPayload { items })
    }

    /// Builds the terminal success event.
    #[must_use]
    pub const fn done() -> Self {
        Self::Done(DonePayload {})
    }

    /// Returns the wire name of the event.
    #[must_use]
    pub const fn name(&self) -> EventName {
        match self {
            Self::Meta(_) => EventName::Meta,
            Self::Chunk(_) => EventName::Chunk,
            Self::Suggestions(_) => EventName::Suggestions,
            Self::Error(_) => EventName::Error,
            Self::Done(_) => EventName::Done,
        }
    }

    /// Serialises the payload alone, as carried on the `data:` line.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented as JSON, which
    /// only happens for non-finite `confidence` values.
    pub fn data(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Meta(payload) => serde_json::to_value(payload),
            Self::Chunk(payload) => serde_json::to_value(payload),
            Self::Suggestions(payload) => serde_json::to_value(payload),
            Self::Error(payload) => serde_json::to_value(payload),
            Self::Done(payload) => serde_json::to_value(payload),
        }
    }
}
