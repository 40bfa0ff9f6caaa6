//! Marker substitution over an arbitrarily chunked token stream.
//!
//! The processor keeps two buffers. `buffer` holds trailing text that might
//! still be the start of a marker; `pending` holds text already known to be
//! prose. Prose is flushed as a single `chunk(text)` event only when a quote is
//! about to be emitted or the stream ends, so the emitted sequence does not
//! depend on how the upstream split its output into fragments.
//!
//! Malformed or truncated markers degrade to literal prose. Markers naming
//! passage `0`, a position past the end of the list, or the reserved `CITE`
//! keyword produce no event and leave the surrounding prose joined.

use std::mem;
use std::pin::pin;

use futures::{Stream, StreamExt};
use tracing::debug;

use verbatim_types::{Event, Fragment, Passage, Usage};

use crate::PROCESSOR_TARGET;
use crate::marker::{Marker, MarkerKeyword, match_complete, partial_marker_start};
use crate::passage::{format_passage, slice_passage};
use crate::sink::EventSink;

/// Result of a fully consumed stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Raw upstream text, markers included.
    pub full_output: String,
    /// Usage reported by the last fragment that carried any.
    pub usage: Option<Usage>,
}

/// Incremental marker substitution state for one response.
#[derive(Debug)]
pub struct StreamProcessor<'p> {
    passages: &'p [Passage],
    buffer: String,
    pending: String,
    full_output: String,
    usage: Option<Usage>,
}

impl<'p> StreamProcessor<'p> {
    /// Creates a processor resolving markers against `passages`.
    #[must_use]
    pub const fn new(passages: &'p [Passage]) -> Self {
        Self {
            passages,
            buffer: String::new(),
            pending: String::new(),
            full_output: String::new(),
            usage: None,
        }
    }

    /// Consumes one fragment, emitting any events it completes.
    pub fn push<S>(&mut self, fragment: Fragment, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        if let Some(usage) = fragment.usage {
            self.usage = Some(usage);
        }
        self.full_output.push_str(&fragment.content);
        self.buffer.push_str(&fragment.content);
        self.drain(sink);
    }

    /// Flushes all remaining text and returns the outcome.
    ///
    /// Trailing text is emitted even when it looks like a truncated marker.
    pub fn finish<S>(mut self, sink: &mut S) -> StreamOutcome
    where
        S: EventSink + ?Sized,
    {
        self.flush_remaining(sink);
        StreamOutcome {
            full_output: self.full_output,
            usage: self.usage,
        }
    }

    fn drain<S>(&mut self, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        while let Some(found) = match_complete(&self.buffer) {
            self.pending.extend(self.buffer.drain(..found.span.start));
            self.buffer.drain(..found.span.len());
            if let Some(quote) = self.resolve(&found.marker) {
                self.flush_pending(sink);
                sink.emit(quote);
            }
        }
        let keep_from = partial_marker_start(&self.buffer);
        self.pending.extend(self.buffer.drain(..keep_from));
    }

    fn resolve(&self, marker: &Marker) -> Option<Event> {
        if marker.keyword != MarkerKeyword::Quote {
            debug!(target: PROCESSOR_TARGET, index = marker.index, "ignoring cite marker");
            return None;
        }
        let Some(passage) = marker
            .passage_position()
            .and_then(|position| self.passages.get(position))
        else {
            debug!(
                target: PROCESSOR_TARGET,
                index = marker.index,
                available = self.passages.len(),
                "dropping out-of-range quote marker"
            );
            return None;
        };
        let text = match marker.sentences {
            Some(range) => slice_passage(passage, range),
            None => format_passage(passage),
        };
        Some(Event::quote(text, &passage.reference, &passage.url))
    }

    fn flush_pending<S>(&mut self, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        let content = mem::take(&mut self.pending);
        if !content.trim().is_empty() {
            sink.emit(Event::text(content));
        }
    }

    fn flush_remaining<S>(&mut self, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        let trailing = mem::take(&mut self.buffer);
        self.pending.push_str(&trailing);
        self.flush_pending(sink);
    }
}

/// Drives a processor over an asynchronous fragment stream.
///
/// Returns the upstream error if the stream fails; prose received before the
/// failure is flushed to `sink` first.
///
/// # Errors
///
/// Propagates the first error yielded by `fragments`.
pub async fn process<F, E, S>(
    fragments: F,
    passages: &[Passage],
    sink: &mut S,
) -> Result<StreamOutcome, E>
where
    F: Stream<Item = Result<Fragment, E>>,
    S: EventSink + ?Sized,
{
    let mut fragments = pin!(fragments);
    let mut processor = StreamProcessor::new(passages);
    while let Some(item) = fragments.next().await {
        match item {
            Ok(fragment) => processor.push(fragment, sink),
            Err(error) => {
                processor.flush_remaining(sink);
                return Err(error);
            }
        }
    }
    Ok(processor.finish(sink))
}

#[cfg(test)]
mod tests;
