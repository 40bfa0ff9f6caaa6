//! Streaming core of the Verbatim answer pipeline.
//!
//! The upstream language model is instructed to reference passages with quote
//! markers such as `{{QUOTE:2:s1:s3}}` rather than reproducing their text. This
//! crate turns the raw fragment stream into client events:
//!
//! - [`marker`] recognises complete markers and possible marker prefixes;
//! - [`processor`] substitutes verified passage text for markers while keeping
//!   the emitted sequence independent of fragment boundaries;
//! - [`wire`] frames events for the event-stream transport and sends periodic
//!   heartbeat comments.
//!
//! ```
//! use verbatim_stream::StreamProcessor;
//! use verbatim_types::{Event, Fragment, Passage};
//!
//! let passages = [Passage::new("1.1", "I am Ra.", "https://example.test/1")];
//! let mut events: Vec<Event> = Vec::new();
//! let mut processor = StreamProcessor::new(&passages);
//! for piece in ["As said: ", "{{QUO", "TE:1}}", " Indeed."] {
//!     processor.push(Fragment::text(piece), &mut events);
//! }
//! processor.finish(&mut events);
//!
//! assert_eq!(
//!     events,
//!     vec![
//!         Event::text("As said: "),
//!         Event::quote("I am Ra.", "1.1", "https://example.test/1"),
//!         Event::text(" Indeed."),
//!     ]
//! );
//! ```

pub mod marker;
pub mod passage;
pub mod processor;
mod sink;
pub mod wire;

pub use self::marker::{Marker, MarkerKeyword, MarkerMatch, SentenceRange};
pub use self::passage::{PassageError, format_passage, validate_passages};
pub use self::processor::{StreamOutcome, StreamProcessor, process};
pub use self::sink::EventSink;
pub use self::wire::{HEARTBEAT_COMMENT, Heartbeat, WireSender};

/// Tracing target for marker substitution diagnostics.
pub(crate) const PROCESSOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::processor");

/// Tracing target for transport framing diagnostics.
pub(crate) const WIRE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::wire");

#[cfg(test)]
mod tests;
