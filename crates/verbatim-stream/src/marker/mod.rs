//! Quote marker grammar.
//!
//! Generated text embeds directives of the form `{{QUOTE:<n>}}` or
//! `{{QUOTE:<n>:s<start>:s<end>}}`. The grammar is
//!
//! ```text
//! "{{" keyword ":" digits [ ":" "s" digits ":" "s" digits ] "}}"
//! keyword = "QUOTE" | "CITE"
//! ```
//!
//! Recognition is driven by the explicit state walk in [`scanner`] rather than
//! a pattern engine, so the set of strings accepted as an unfinished marker is
//! exactly the set of prefixes the walk can still extend.
//!
//! Digit runs are capped at [`MAX_INDEX_DIGITS`]; a longer run is not a
//! marker. The cap bounds [`MAX_MARKER_LEN`], which in turn bounds how much
//! trailing text the stream processor ever has to hold back.

mod scanner;

use std::ops::Range;

use self::scanner::{MarkerScanner, Step};

/// Longest digit run accepted for an index or sentence bound.
pub const MAX_INDEX_DIGITS: usize = 6;

/// Length in bytes of the longest complete marker.
pub const MAX_MARKER_LEN: usize = OPEN.len()
    + LONGEST_KEYWORD
    + 1
    + MAX_INDEX_DIGITS
    + 2 * (2 + MAX_INDEX_DIGITS)
    + CLOSE.len();

/// Length in bytes of the longest string that can still grow into a marker.
pub const MAX_PARTIAL_LEN: usize = MAX_MARKER_LEN - 1;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const LONGEST_KEYWORD: usize = 5;

/// Directive keyword introducing a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKeyword {
    /// Substitute a verified passage.
    Quote,
    /// Reserved citation form; recognised but not substituted.
    Cite,
}

impl MarkerKeyword {
    /// The literal keyword text.
    #[must_use]
    pub const fn literal(self) -> &'static str {
        match self {
            Self::Quote => "QUOTE",
            Self::Cite => "CITE",
        }
    }

    fn from_initial(initial: char) -> Option<Self> {
        match initial {
            'Q' => Some(Self::Quote),
            'C' => Some(Self::Cite),
            _ => None,
        }
    }
}

/// Inclusive, 1-based sentence range requested by a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SentenceRange {
    /// First sentence to include.
    pub start: usize,
    /// Last sentence to include.
    pub end: usize,
}

/// A fully recognised marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Marker {
    /// Directive keyword.
    pub keyword: MarkerKeyword,
    /// 1-based position in the request's passage list.
    pub index: usize,
    /// Optional sentence range to extract from the passage.
    pub sentences: Option<SentenceRange>,
}

impl Marker {
    /// Zero-based passage position, or `None` for index `0`.
    #[must_use]
    pub const fn passage_position(&self) -> Option<usize> {
        self.index.checked_sub(1)
    }
}

/// A marker located inside a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch {
    /// The recognised marker.
    pub marker: Marker,
    /// Byte span of the marker text within the searched buffer.
    pub span: Range<usize>,
}

/// Finds the first complete marker in `buffer`.
///
/// Candidates are tried at every `{{` in order; the first candidate whose walk
/// reaches the closing braces wins. Overlapping openers such as `{{{QUOTE:1}}`
/// resolve to the marker starting at the second brace.
///
/// ```
/// use verbatim_stream::marker::{match_complete, MarkerKeyword};
///
/// let found = match_complete("see {{QUOTE:2:s1:s3}} here").expect("marker");
/// assert_eq!(found.marker.keyword, MarkerKeyword::Quote);
/// assert_eq!(found.marker.index, 2);
/// assert_eq!(found.span, 4..21);
/// ```
#[must_use]
pub fn match_complete(buffer: &str) -> Option<MarkerMatch> {
    buffer
        .char_indices()
        .filter(|(start, _)| {
            buffer
                .get(*start..)
                .is_some_and(|tail| tail.starts_with(OPEN))
        })
        .find_map(|(start, _)| complete_at(buffer, start))
}

fn complete_at(buffer: &str, start: usize) -> Option<MarkerMatch> {
    let tail = buffer.get(start..)?;
    let mut scanner = MarkerScanner::new();
    for (offset, c) in tail.char_indices() {
        match scanner.advance(c) {
            Step::Continue => {}
            Step::Complete(marker) => {
                let end = start + offset + c.len_utf8();
                return Some(MarkerMatch {
                    marker,
                    span: start..end,
                });
            }
            Step::Reject => return None,
        }
    }
    None
}

/// Reports whether `suffix` is a proper, non-empty prefix of some marker.
///
/// Returns `false` for complete markers and for any string the state walk
/// rejects at some character.
///
/// ```
/// use verbatim_stream::marker::is_possible_prefix;
///
/// assert!(is_possible_prefix("{{QUO"));
/// assert!(is_possible_prefix("{{QUOTE:12:s"));
/// assert!(!is_possible_prefix("{{QUOTE:1}}"));
/// assert!(!is_possible_prefix("{{QUOTE:x"));
/// ```
#[must_use]
pub fn is_possible_prefix(suffix: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    let mut scanner = MarkerScanner::new();
    suffix
        .chars()
        .all(|c| matches!(scanner.advance(c), Step::Continue))
}

/// Byte offset where the longest possibly-unfinished marker suffix begins.
///
/// Only the trailing [`MAX_PARTIAL_LEN`] bytes are examined. Returns
/// `buffer.len()` when no suffix can grow into a marker.
#[must_use]
pub fn partial_marker_start(buffer: &str) -> usize {
    let window_start = buffer.len().saturating_sub(MAX_PARTIAL_LEN);
    buffer
        .char_indices()
        .map(|(index, _)| index)
        .filter(|index| *index >= window_start)
        .find(|index| {
            buffer
                .get(*index..)
                .is_some_and(is_possible_prefix)
        })
        .unwrap_or(buffer.len())
}
