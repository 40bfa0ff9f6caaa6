//! Detached, order-preserving cache appends.
//!
//! A producer must never wait on the cache, yet the log must list events in
//! the order they were sent. [`CacheWriter`] queues entries on an unbounded
//! channel consumed by one task per response, which appends them one at a
//! time. Ordering is therefore issued-before: an entry is queued before the
//! next event is sent, but its append may complete later.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use verbatim_types::{CachedEvent, ResponseId};

use crate::{CACHE_TARGET, CacheError, ResponseCache};

/// Receives append failures from a [`CacheWriter`] task.
pub trait AppendFailureHandler: Send + Sync {
    /// Invoked once per failed append; the entry is not retried.
    fn append_failed(&self, id: &ResponseId, entry: &CachedEvent, error: &CacheError);
}

/// Handler that logs failures and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAppendFailures;

impl AppendFailureHandler for LogAppendFailures {
    fn append_failed(&self, id: &ResponseId, entry: &CachedEvent, error: &CacheError) {
        warn!(
            target: CACHE_TARGET,
            response_id = %id,
            event = %entry.event,
            %error,
            "cache append failed"
        );
    }
}

/// Fire-and-forget writer for one response log.
#[derive(Debug)]
pub struct CacheWriter {
    entries: mpsc::UnboundedSender<CachedEvent>,
    task: JoinHandle<()>,
}

impl CacheWriter {
    /// Starts a writer whose failures are only logged.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(cache: Arc<dyn ResponseCache>, id: ResponseId) -> Self {
        Self::spawn_with(cache, id, Arc::new(LogAppendFailures))
    }

    /// Starts a writer reporting failures to `failures`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn_with(
        cache: Arc<dyn ResponseCache>,
        id: ResponseId,
        failures: Arc<dyn AppendFailureHandler>,
    ) -> Self {
        let (entries, mut receiver) = mpsc::unbounded_channel::<CachedEvent>();
        let task = tokio::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                if let Err(error) = cache.append(&id, &entry).await {
                    failures.append_failed(&id, &entry, &error);
                }
            }
            trace!(target: CACHE_TARGET, response_id = %id, "cache writer drained");
        });
        Self { entries, task }
    }

    /// Queues one entry. Never blocks and never fails.
    pub fn record(&self, entry: CachedEvent) {
        if self.entries.send(entry).is_err() {
            warn!(target: CACHE_TARGET, "cache writer task ended early; entry dropped");
        }
    }

    /// Closes the queue and waits until every queued entry has been appended.
    pub async fn finish(self) {
        let Self { entries, task } = self;
        drop(entries);
        if let Err(error) = task.await {
            warn!(target: CACHE_TARGET, %error, "cache writer task failed");
        }
    }
}
