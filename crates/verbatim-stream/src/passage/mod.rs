//! Passage text preparation for quote substitution.
//!
//! A quote marker either substitutes the whole passage or an inclusive,
//! 1-based sentence range of it. Sentences end after `.`, `!`, or `?`
//! (optionally followed by closing quotes or brackets) when the next
//! character is whitespace or the end of the text.

use thiserror::Error;

use verbatim_types::Passage;

use crate::marker::SentenceRange;

/// Defects that make a passage list unusable for substitution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassageError {
    /// A passage had an empty or whitespace-only reference.
    #[error("passage {position} has a blank reference")]
    BlankReference {
        /// 1-based position of the passage in the list.
        position: usize,
    },
    /// A passage had empty or whitespace-only text.
    #[error("passage '{reference}' has blank text")]
    BlankText {
        /// Reference of the offending passage.
        reference: String,
    },
}

/// Checks that every passage can be quoted.
///
/// # Errors
///
/// Returns the first [`PassageError`] found, in list order.
pub fn validate_passages(passages: &[Passage]) -> Result<(), PassageError> {
    for (offset, passage) in passages.iter().enumerate() {
        if passage.reference.trim().is_empty() {
            return Err(PassageError::BlankReference {
                position: offset + 1,
            });
        }
        if passage.text.trim().is_empty() {
            return Err(PassageError::BlankText {
                reference: passage.reference.clone(),
            });
        }
    }
    Ok(())
}

/// Whole-passage quote text.
#[must_use]
pub fn format_passage(passage: &Passage) -> String {
    passage.text.trim().to_owned()
}

/// Quote text for a sentence range of `passage`.
///
/// `end` past the last sentence clamps to the last sentence. A range that
/// starts at `0`, starts after it ends, or starts past the last sentence
/// falls back to the whole passage.
#[must_use]
pub fn slice_passage(passage: &Passage, range: SentenceRange) -> String {
    let sentences = split_sentences(&passage.text);
    if range.start == 0 || range.start > range.end || range.start > sentences.len() {
        return format_passage(passage);
    }
    let end = range.end.min(sentences.len());
    sentences
        .iter()
        .skip(range.start - 1)
        .take(end + 1 - range.start)
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits text into trimmed, non-empty sentences.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        while let Some((_, closer)) = chars.peek() {
            if matches!(closer, '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}') {
                chars.next();
            } else {
                break;
            }
        }
        let end = chars.peek().map_or(text.len(), |(index, _)| *index);
        let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
        if at_boundary {
            push_sentence(&mut sentences, text, start, end);
            start = end;
        }
    }
    push_sentence(&mut sentences, text, start, text.len());
    sentences
}

fn push_sentence<'t>(sentences: &mut Vec<&'t str>, text: &'t str, start: usize, end: usize) {
    if let Some(sentence) = text.get(start..end).map(str::trim)
        && !sentence.is_empty()
    {
        sentences.push(sentence);
    }
}
