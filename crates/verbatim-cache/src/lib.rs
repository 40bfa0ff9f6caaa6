//! Replayable per-response event logs.
//!
//! Every event sent to a live client is also appended to a log keyed by the
//! response identifier. A client that loses its connection can fetch the log
//! and replay exactly what it missed; the log reports itself complete once it
//! contains a `done` event.
//!
//! Two backends sit behind [`ResponseCache`]: [`RedisResponseCache`] for shared,
//! restart-surviving storage and [`MemoryResponseCache`] as a bounded local
//! fallback. [`connect`] picks one from [`CacheSettings`]. Producers write
//! through a [`CacheWriter`], which appends in issue order on a detached task.

mod durable;
mod error;
mod memory;
mod settings;
mod writer;

use async_trait::async_trait;

use verbatim_types::{CachedEvent, CachedLog, ResponseId};

pub use self::durable::RedisResponseCache;
pub use self::error::CacheError;
pub use self::memory::MemoryResponseCache;
pub use self::settings::{CacheBackend, CacheSettings, ConnectedCache, connect};
pub use self::writer::{AppendFailureHandler, CacheWriter, LogAppendFailures};

/// Tracing target for cache diagnostics.
pub(crate) const CACHE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cache");

/// Append-only, expiring store of response event logs.
///
/// Appends to one identifier are atomic with respect to each other: concurrent
/// appends never overwrite one another. Each append resets the identifier's
/// expiry.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Appends one event to the log of `id`, creating the log if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be encoded or the backend rejects
    /// the write.
    async fn append(&self, id: &ResponseId, entry: &CachedEvent) -> Result<(), CacheError>;

    /// Fetches the log of `id`, or `None` when it is unknown or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn get(&self, id: &ResponseId) -> Result<Option<CachedLog>, CacheError>;
}
