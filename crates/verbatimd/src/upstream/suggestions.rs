use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;

use crate::collaborators::{
    ChatMessage, CompletionProvider, CompletionRequest, SuggestionGenerator, UpstreamError,
};

/// Number of suggestions requested and kept.
pub const SUGGESTION_COUNT: usize = 3;

const ANSWER_EXCERPT_CHARS: usize = 1500;

const INSTRUCTIONS: &str = "\
Suggest three short follow-up questions the reader might ask next. Write one \
question per line with no numbering, bullets, or commentary.";

/// Generates follow-ups by asking the completion provider.
#[derive(Clone)]
pub struct CompletionSuggestionGenerator {
    completion: Arc<dyn CompletionProvider>,
}

impl std::fmt::Debug for CompletionSuggestionGenerator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CompletionSuggestionGenerator")
            .finish_non_exhaustive()
    }
}

impl CompletionSuggestionGenerator {
    /// Creates a generator backed by `completion`.
    #[must_use]
    pub fn new(completion: Arc<dyn CompletionProvider>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl SuggestionGenerator for CompletionSuggestionGenerator {
    async fn suggest(
        &self,
        question: &str,
        answer: &str,
        intent: &str,
    ) -> Result<Vec<String>, UpstreamError> {
        let excerpt: String = answer.chars().take(ANSWER_EXCERPT_CHARS).collect();
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(INSTRUCTIONS),
                ChatMessage::user(format!(
                    "Question ({intent}): {question}\n\nAnswer:\n{excerpt}"
                )),
            ],
            max_tokens: Some(120),
            temperature: Some(0.7),
        };
        let text: String = self
            .completion
            .stream(request)
            .await?
            .map_ok(|fragment| fragment.content)
            .try_collect()
            .await?;

        let items = parse_suggestions(&text);
        if items.is_empty() {
            return Err(UpstreamError::InvalidResponse {
                message: String::from("completion produced no suggestions"),
            });
        }
        Ok(items)
    }
}

/// Extracts up to three suggestions from model output, one per line.
///
/// List bullets and numbering are stripped; blank lines are skipped.
#[must_use]
pub fn parse_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(SUGGESTION_COUNT)
        .map(str::to_owned)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim();
    let unbulleted = trimmed.trim_start_matches(['-', '*', '•']);
    let digits_end = unbulleted
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unbulleted.len());
    let unnumbered = match unbulleted.get(digits_end..) {
        Some(rest) if digits_end > 0 && (rest.starts_with('.') || rest.starts_with(')')) => {
            rest.get(1..).unwrap_or_default()
        }
        _ => unbulleted,
    };
    unnumbered.trim()
}

/// Deterministic follow-ups used when generation fails.
#[must_use]
pub fn fallback_suggestions(intent: &str) -> Vec<String> {
    let items: [&str; SUGGESTION_COUNT] = match intent {
        "definition" => [
            "Can you give an example of this?",
            "How does this relate to other concepts in the material?",
            "Where is this first introduced?",
        ],
        "comparison" => [
            "What do these ideas have in common?",
            "Which passages discuss the differences in more detail?",
            "Are there other ideas worth comparing?",
        ],
        _ => [
            "Can you explain that in simpler terms?",
            "Where does the material discuss this further?",
            "What related topics should I read about next?",
        ],
    };
    items.iter().map(|item| (*item).to_owned()).collect()
}
