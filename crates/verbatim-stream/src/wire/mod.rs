//! Event-stream framing and the transport-bound sender.
//!
//! An event is framed as
//!
//! ```text
//! event: <name>
//! data: <compact json>
//!
//! ```
//!
//! and a heartbeat as a comment line `: <comment>` followed by a blank line.
//! Compact JSON escapes embedded newlines, so every payload fits on one
//! `data:` line.

mod heartbeat;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use verbatim_types::{CachedEvent, Event, EventName};

use crate::WIRE_TARGET;

pub use self::heartbeat::{HEARTBEAT_COMMENT, Heartbeat};

/// Frames an event name and payload.
#[must_use]
pub fn encode_frame(name: EventName, data: &serde_json::Value) -> Bytes {
    Bytes::from(format!("event: {name}\ndata: {data}\n\n"))
}

/// Frames a persisted event exactly as it was sent live.
#[must_use]
pub fn encode_cached(entry: &CachedEvent) -> Bytes {
    encode_frame(entry.event, &entry.data)
}

/// Frames an event.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialised.
pub fn encode_event(event: &Event) -> Result<Bytes, serde_json::Error> {
    Ok(encode_frame(event.name(), &event.data()?))
}

/// Frames a heartbeat comment. Line breaks in `comment` are replaced with
/// spaces so the frame stays a single comment line.
#[must_use]
pub fn encode_heartbeat(comment: &str) -> Bytes {
    let single_line = comment.replace(['\r', '\n'], " ");
    Bytes::from(format!(": {single_line}\n\n"))
}

/// Sender bound to one client connection.
///
/// Enqueue failures mean the client went away; they are swallowed so the
/// producing task keeps running and the response cache still receives the
/// complete response.
#[derive(Debug, Clone)]
pub struct WireSender {
    frames: mpsc::UnboundedSender<Bytes>,
}

impl WireSender {
    /// Creates a sender and the receiving half consumed by the transport.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (frames, receiver) = mpsc::unbounded_channel();
        (Self { frames }, receiver)
    }

    /// Enqueues a persisted-form event.
    pub fn send_cached(&self, entry: &CachedEvent) {
        self.send_frame(encode_cached(entry));
    }

    /// Enqueues an event, logging and skipping payloads that fail to encode.
    pub fn send_event(&self, event: &Event) {
        match encode_event(event) {
            Ok(frame) => self.send_frame(frame),
            Err(error) => warn!(
                target: WIRE_TARGET,
                event = %event.name(),
                %error,
                "dropping unencodable event"
            ),
        }
    }

    /// Enqueues a heartbeat comment.
    pub fn send_heartbeat(&self, comment: &str) {
        self.send_frame(encode_heartbeat(comment));
    }

    /// Whether the receiving side has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }

    fn send_frame(&self, frame: Bytes) {
        if self.frames.send(frame).is_err() {
            trace!(target: WIRE_TARGET, "client disconnected; frame discarded");
        }
    }
}
