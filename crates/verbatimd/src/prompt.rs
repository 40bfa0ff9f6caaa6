//! Prompt assembly for answer generation.

use verbatim_stream::format_passage;
use verbatim_types::Passage;

use crate::collaborators::ChatMessage;

const INSTRUCTIONS: &str = "\
You answer questions about the source material using only the numbered \
passages below. Do not copy passage text into your answer. Where a passage \
supports a point, write a quote marker instead and the verified text will be \
inserted for you:
- {{QUOTE:n}} quotes passage n in full;
- {{QUOTE:n:sA:sB}} quotes sentences A to B of passage n, counting from 1.
Only use passage numbers from the list. If the passages do not answer the \
question, say so plainly.";

/// Builds the chat messages for one question.
///
/// Passages are numbered from 1 in the order given, matching the order of the
/// `meta` event and the indices the stream processor resolves.
#[must_use]
pub fn build_messages(question: &str, passages: &[Passage]) -> Vec<ChatMessage> {
    let mut system = String::from(INSTRUCTIONS);
    system.push_str("\n\nPassages:\n");
    for (position, passage) in passages.iter().enumerate() {
        system.push_str(&format!(
            "[{number}] ({reference}) {text}\n",
            number = position + 1,
            reference = passage.reference,
            text = format_passage(passage),
        ));
    }
    if passages.is_empty() {
        system.push_str("(none)\n");
    }
    vec![ChatMessage::system(system), ChatMessage::user(question.trim())]
}
