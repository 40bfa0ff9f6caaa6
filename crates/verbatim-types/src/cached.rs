//! Replayable event log records.

use serde::{Deserialize, Serialize};

use crate::event::{Event, EventName};

/// An event as persisted in a response log.
///
/// The payload is kept as raw JSON so a replay reproduces exactly what the
/// live client received, independent of later payload schema changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEvent {
    /// Wire name of the event.
    pub event: EventName,
    /// Payload as carried on the `data:` line.
    pub data: serde_json::Value,
}

impl CachedEvent {
    /// Captures an event for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialised.
    pub fn from_event(event: &Event) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.name(),
            data: event.data()?,
        })
    }

    /// Reports whether this entry is the terminal `done` event.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.event == EventName::Done
    }
}

/// The ordered event log of one response.
///
/// Completion is derived from the entries rather than stored: a log is
/// complete exactly when it contains a `done` event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedLog {
    events: Vec<CachedEvent>,
}

impl CachedLog {
    /// Builds a log, discarding anything recorded after the first `done`.
    #[must_use]
    pub fn new(mut events: Vec<CachedEvent>) -> Self {
        if let Some(position) = events.iter().position(CachedEvent::is_done) {
            events.truncate(position + 1);
        }
        Self { events }
    }

    /// Entries in issue order.
    #[must_use]
    pub fn events(&self) -> &[CachedEvent] {
        &self.events
    }

    /// Consumes the log, yielding its entries.
    #[must_use]
    pub fn into_events(self) -> Vec<CachedEvent> {
        self.events
    }

    /// Whether the response finished successfully.
    #[must_use]
    pub fn complete(&self) -> bool {
        self.events.iter().any(CachedEvent::is_done)
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(event: &Event) -> CachedEvent {
        CachedEvent::from_event(event).expect("serialise")
    }

    #[test]
    fn complete_when_done_present() {
        let log = CachedLog::new(vec![
            entry(&Event::text("a")),
            entry(&Event::text("b")),
            entry(&Event::done()),
        ]);
        assert!(log.complete());
    }

    #[test]
    fn incomplete_without_done() {
        let log = CachedLog::new(vec![entry(&Event::text("a")), entry(&Event::text("b"))]);
        assert!(!log.complete());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn entries_after_done_are_discarded() {
        let log = CachedLog::new(vec![
            entry(&Event::text("a")),
            entry(&Event::done()),
            entry(&Event::text("late")),
            entry(&Event::done()),
        ]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.events().iter().filter(|e| e.is_done()).count(), 1);
    }

    #[test]
    fn cached_event_json_shape_matches_wire() {
        let json = serde_json::to_value(entry(&Event::text("hi"))).expect("serialise");
        assert_eq!(
            json,
            serde_json::json!({"event": "chunk", "data": {"type": "text", "content": "hi"}})
        );
    }

    #[test]
    fn unknown_event_name_fails_to_decode() {
        let result = serde_json::from_str::<CachedEvent>(r#"{"event":"bogus","data":{}}"#);
        assert!(result.is_err());
    }
}
