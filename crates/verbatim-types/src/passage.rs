//! Verified corpus excerpts.

use serde::{Deserialize, Serialize};

/// A verified excerpt from the source corpus.
///
/// Passages are fetched once per request before generation starts and are
/// never mutated afterwards. Quote markers in generated text address them by
/// 1-based position in the request's passage list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable reference string identifying the excerpt (for example `"1.1"`).
    pub reference: String,
    /// Verbatim excerpt text.
    pub text: String,
    /// Canonical location of the excerpt.
    pub url: String,
}

impl Passage {
    /// Builds a passage from its parts.
    #[must_use]
    pub fn new(
        reference: impl Into<String>,
        text: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            text: text.into(),
            url: url.into(),
        }
    }
}
