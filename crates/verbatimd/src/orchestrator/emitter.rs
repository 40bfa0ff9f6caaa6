//! Event sink that frames each event for the client and records it to the cache.

use tracing::warn;

use verbatim_cache::CacheWriter;
use verbatim_stream::{EventSink, WireSender};
use verbatim_types::{CachedEvent, Event};

use super::ORCHESTRATOR_TARGET;

/// Sends each event to the client, then queues it for the cache.
///
/// Both destinations receive the same persisted form, so a replay is
/// byte-identical to the live stream.
pub(super) struct Emitter<'a> {
    wire: &'a WireSender,
    writer: &'a CacheWriter,
}

impl<'a> Emitter<'a> {
    pub(super) const fn new(wire: &'a WireSender, writer: &'a CacheWriter) -> Self {
        Self { wire, writer }
    }
}

impl EventSink for Emitter<'_> {
    fn emit(&mut self, event: Event) {
        match CachedEvent::from_event(&event) {
            Ok(entry) => {
                self.wire.send_cached(&entry);
                self.writer.record(entry);
            }
            Err(error) => warn!(
                target: ORCHESTRATOR_TARGET,
                event = %event.name(),
                %error,
                "dropping unencodable event"
            ),
        }
    }
}
