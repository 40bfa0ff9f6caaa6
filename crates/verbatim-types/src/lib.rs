//! Shared records for the Verbatim answer pipeline.
//!
//! These types cross every crate boundary in the workspace: the stream
//! processor consumes [`Fragment`]s and [`Passage`]s and emits [`Event`]s, the
//! wire encoder frames events for the live client, and the response cache
//! persists them as [`CachedEvent`]s so a disconnected client can replay the
//! exact sequence it missed.

mod cached;
mod event;
mod fragment;
mod passage;
mod response_id;

pub use self::cached::{CachedEvent, CachedLog};
pub use self::event::{
    ChunkPayload, DonePayload, ErrorPayload, Event, EventName, MetaPayload, SuggestionsPayload,
};
pub use self::fragment::{Fragment, Usage};
pub use self::passage::Passage;
pub use self::response_id::{ResponseId, ResponseIdError};
