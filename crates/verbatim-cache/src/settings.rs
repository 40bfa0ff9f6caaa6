//! Backend selection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use url::Url;

use crate::{CACHE_TARGET, CacheError, MemoryResponseCache, RedisResponseCache, ResponseCache};

/// Parameters for [`connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Redis URL; `None` selects the in-memory backend.
    pub url: Option<Url>,
    /// Key namespace for the durable backend.
    pub key_prefix: String,
    /// Sliding expiry applied on every append.
    pub ttl: Duration,
    /// Bound on logs tracked by the in-memory backend.
    pub max_responses: usize,
}

/// Backend chosen by [`connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// Shared Redis store.
    Redis,
    /// Local bounded memory.
    Memory,
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        })
    }
}

/// A connected cache and how it was chosen.
pub struct ConnectedCache {
    /// The cache handle to inject into producers and readers.
    pub cache: Arc<dyn ResponseCache>,
    /// Backend in use.
    pub backend: CacheBackend,
    /// Why the durable backend was configured but not used.
    pub fallback_reason: Option<CacheError>,
}

impl fmt::Debug for ConnectedCache {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConnectedCache")
            .field("backend", &self.backend)
            .field("fallback_reason", &self.fallback_reason)
            .finish_non_exhaustive()
    }
}

/// Connects the configured backend.
///
/// A configured but unreachable Redis store falls back to the in-memory
/// backend; the failure is returned in [`ConnectedCache::fallback_reason`]
/// for the caller to report.
pub async fn connect(settings: &CacheSettings) -> ConnectedCache {
    let memory = || -> Arc<dyn ResponseCache> {
        Arc::new(MemoryResponseCache::new(settings.max_responses, settings.ttl))
    };

    let Some(url) = settings.url.as_ref() else {
        info!(target: CACHE_TARGET, backend = %CacheBackend::Memory, "response cache ready");
        return ConnectedCache {
            cache: memory(),
            backend: CacheBackend::Memory,
            fallback_reason: None,
        };
    };

    match RedisResponseCache::connect(url, settings.key_prefix.clone(), settings.ttl).await {
        Ok(redis) => {
            info!(target: CACHE_TARGET, backend = %CacheBackend::Redis, "response cache ready");
            ConnectedCache {
                cache: Arc::new(redis),
                backend: CacheBackend::Redis,
                fallback_reason: None,
            }
        }
        Err(error) => ConnectedCache {
            cache: memory(),
            backend: CacheBackend::Memory,
            fallback_reason: Some(error),
        },
    }
}
