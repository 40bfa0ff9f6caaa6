//! Character-at-a-time state walk over the marker grammar.

use super::{MAX_INDEX_DIGITS, Marker, MarkerKeyword, SentenceRange};

/// Which sentence bound a digit run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// Position within the grammar after the characters consumed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Consumed `braces` opening braces (0 to 2).
    Open { braces: u8 },
    /// Consumed `matched` characters of the keyword literal.
    Keyword { keyword: MarkerKeyword, matched: usize },
    /// Keyword complete; expecting `:`.
    KeywordColon { keyword: MarkerKeyword },
    /// Inside the passage index digit run.
    Index {
        keyword: MarkerKeyword,
        digits: usize,
        value: usize,
    },
    /// Consumed `:` after a digit run; expecting `s`.
    RangeMarker {
        keyword: MarkerKeyword,
        index: usize,
        bound: Bound,
        start: usize,
    },
    /// Inside a sentence bound digit run.
    RangeDigits {
        keyword: MarkerKeyword,
        index: usize,
        bound: Bound,
        start: usize,
        digits: usize,
        value: usize,
    },
    /// Consumed the first closing brace.
    Closing { marker: Marker },
}

/// Outcome of feeding one character to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Step {
    /// The input so far is an unfinished marker.
    Continue,
    /// The character completed a marker.
    Complete(Marker),
    /// The input can no longer become a marker.
    Reject,
}

/// Incremental recogniser for a single marker candidate.
#[derive(Debug, Clone)]
pub(super) struct MarkerScanner {
    state: ScanState,
}

impl MarkerScanner {
    pub(super) const fn new() -> Self {
        Self {
            state: ScanState::Open { braces: 0 },
        }
    }

    /// Feeds one character. After `Complete` or `Reject` the scanner must not
    /// be advanced further.
    pub(super) fn advance(&mut self, c: char) -> Step {
        match next_state(self.state, c) {
            Transition::To(state) => {
                self.state = state;
                Step::Continue
            }
            Transition::Done(marker) => Step::Complete(marker),
            Transition::Fail => Step::Reject,
        }
    }
}

enum Transition {
    To(ScanState),
    Done(Marker),
    Fail,
}

fn next_state(state: ScanState, c: char) -> Transition {
    match state {
        ScanState::Open { braces: 0 } if c == '{' => Transition::To(ScanState::Open { braces: 1 }),
        ScanState::Open { braces: 1 } if c == '{' => Transition::To(ScanState::Open { braces: 2 }),
        ScanState::Open { braces: 2 } => match MarkerKeyword::from_initial(c) {
            Some(keyword) => Transition::To(ScanState::Keyword {
                keyword,
                matched: 1,
            }),
            None => Transition::Fail,
        },
        ScanState::Open { .. } => Transition::Fail,
        ScanState::Keyword { keyword, matched } => keyword_step(keyword, matched, c),
        ScanState::KeywordColon { keyword } if c == ':' => Transition::To(ScanState::Index {
            keyword,
            digits: 0,
            value: 0,
        }),
        ScanState::KeywordColon { .. } => Transition::Fail,
        ScanState::Index {
            keyword,
            digits,
            value,
        } => index_step(keyword, digits, value, c),
        ScanState::RangeMarker {
            keyword,
            index,
            bound,
            start,
        } if c == 's' => Transition::To(ScanState::RangeDigits {
            keyword,
            index,
            bound,
            start,
            digits: 0,
            value: 0,
        }),
        ScanState::RangeMarker { .. } => Transition::Fail,
        ScanState::RangeDigits {
            keyword,
            index,
            bound,
            start,
            digits,
            value,
        } => range_step(keyword, index, bound, start, digits, value, c),
        ScanState::Closing { marker } if c == '}' => Transition::Done(marker),
        ScanState::Closing { .. } => Transition::Fail,
    }
}

fn keyword_step(keyword: MarkerKeyword, matched: usize, c: char) -> Transition {
    let literal = keyword.literal();
    if literal.chars().nth(matched) != Some(c) {
        return Transition::Fail;
    }
    let consumed = matched + 1;
    if consumed == literal.len() {
        Transition::To(ScanState::KeywordColon { keyword })
    } else {
        Transition::To(ScanState::Keyword {
            keyword,
            matched: consumed,
        })
    }
}

fn index_step(keyword: MarkerKeyword, digits: usize, value: usize, c: char) -> Transition {
    if let Some(digit) = c.to_digit(10) {
        if digits == MAX_INDEX_DIGITS {
            return Transition::Fail;
        }
        return Transition::To(ScanState::Index {
            keyword,
            digits: digits + 1,
            value: value * 10 + digit as usize,
        });
    }
    if digits == 0 {
        return Transition::Fail;
    }
    match c {
        ':' => Transition::To(ScanState::RangeMarker {
            keyword,
            index: value,
            bound: Bound::Start,
            start: 0,
        }),
        '}' => Transition::To(ScanState::Closing {
            marker: Marker {
                keyword,
                index: value,
                sentences: None,
            },
        }),
        _ => Transition::Fail,
    }
}

fn range_step(
    keyword: MarkerKeyword,
    index: usize,
    bound: Bound,
    start: usize,
    digits: usize,
    value: usize,
    c: char,
) -> Transition {
    if let Some(digit) = c.to_digit(10) {
        if digits == MAX_INDEX_DIGITS {
            return Transition::Fail;
        }
        return Transition::To(ScanState::RangeDigits {
            keyword,
            index,
            bound,
            start,
            digits: digits + 1,
            value: value * 10 + digit as usize,
        });
    }
    if digits == 0 {
        return Transition::Fail;
    }
    match (bound, c) {
        (Bound::Start, ':') => Transition::To(ScanState::RangeMarker {
            keyword,
            index,
            bound: Bound::End,
            start: value,
        }),
        (Bound::End, '}') => Transition::To(ScanState::Closing {
            marker: Marker {
                keyword,
                index,
                sentences: Some(SentenceRange { start, end: value }),
            },
        }),
        _ => Transition::Fail,
    }
}
