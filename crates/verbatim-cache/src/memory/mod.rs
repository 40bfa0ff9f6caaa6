//! In-process cache backend.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::time::Instant;
use tracing::debug;

use verbatim_types::{CachedEvent, CachedLog, ResponseId};

use crate::{CACHE_TARGET, CacheError, ResponseCache};

#[derive(Debug)]
struct MemoryEntry {
    events: Vec<CachedEvent>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn is_complete(&self) -> bool {
        self.events.iter().any(CachedEvent::is_done)
    }
}

/// Bounded in-memory response cache.
///
/// At most `max_responses` logs are tracked; appending to a new identifier
/// beyond that evicts the log appended to least recently. Logs expire `ttl`
/// after their last append. Suitable for single-instance deployments only:
/// logs do not survive a restart and are not shared between processes.
#[derive(Debug)]
pub struct MemoryResponseCache {
    entries: Mutex<LruCache<ResponseId, MemoryEntry>>,
    ttl: Duration,
}

impl MemoryResponseCache {
    /// Creates an empty cache. A bound of zero is treated as one.
    #[must_use]
    pub fn new(max_responses: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_responses).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Drops every tracked log.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of tracked logs, including any not yet purged after expiry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no logs are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<ResponseId, MemoryEntry>> {
        // The guarded map stays consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn purge_expired(entries: &mut LruCache<ResponseId, MemoryEntry>, now: Instant) {
    while entries
        .peek_lru()
        .is_some_and(|(_, entry)| entry.is_expired(now))
    {
        entries.pop_lru();
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn append(&self, id: &ResponseId, entry: &CachedEvent) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now + self.ttl;
        let mut entries = self.lock();
        purge_expired(&mut entries, now);

        if let Some(existing) = entries.get_mut(id) {
            if existing.is_complete() {
                debug!(
                    target: CACHE_TARGET,
                    response_id = %id,
                    event = %entry.event,
                    "ignoring append after done"
                );
                return Ok(());
            }
            existing.events.push(entry.clone());
            existing.expires_at = expires_at;
        } else if let Some((evicted, _)) = entries.push(
            id.clone(),
            MemoryEntry {
                events: vec![entry.clone()],
                expires_at,
            },
        ) {
            debug!(target: CACHE_TARGET, response_id = %evicted, "evicted response log");
        }
        Ok(())
    }

    async fn get(&self, id: &ResponseId) -> Result<Option<CachedLog>, CacheError> {
        let now = Instant::now();
        let mut entries = self.lock();
        let Some(entry) = entries.peek(id) else {
            return Ok(None);
        };
        if entry.is_expired(now) {
            entries.pop(id);
            return Ok(None);
        }
        Ok(Some(CachedLog::new(entry.events.clone())))
    }
}
