//! Destinations for processed events.

use verbatim_types::Event;

/// Receives events in emission order.
///
/// Emission is infallible from the producer's point of view: sinks bound to a
/// network transport must absorb delivery failures themselves so generation
/// always runs to completion.
pub trait EventSink {
    /// Accepts the next event.
    fn emit(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

impl<S> EventSink for &mut S
where
    S: EventSink + ?Sized,
{
    fn emit(&mut self, event: Event) {
        (**self).emit(event);
    }
}
