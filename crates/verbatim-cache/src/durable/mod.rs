//! Redis-backed cache backend.
//!
//! Each response log is a Redis list under `<prefix><response id>`. An append
//! is a `MULTI`/`EXEC` pipeline of `RPUSH` and `EXPIRE`, so concurrent writers
//! never race on a read-modify-write and every append refreshes the TTL.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::warn;
use url::Url;

use verbatim_types::{CachedEvent, CachedLog, ResponseId};

use crate::{CACHE_TARGET, CacheError, ResponseCache};

/// Deadline for establishing the initial connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Shared, restart-surviving response cache.
#[derive(Clone)]
pub struct RedisResponseCache {
    connection: ConnectionManager,
    key_prefix: String,
    ttl_secs: i64,
}

impl std::fmt::Debug for RedisResponseCache {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RedisResponseCache")
            .field("key_prefix", &self.key_prefix)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl RedisResponseCache {
    /// Connects to the store at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connect`] when the URL is not a Redis URL or the
    /// server refuses the connection, and [`CacheError::ConnectTimeout`] when
    /// it does not answer in time.
    pub async fn connect(
        url: &Url,
        key_prefix: impl Into<String>,
        ttl: Duration,
    ) -> Result<Self, CacheError> {
        let display_url = redacted(url);
        let client = redis::Client::open(url.as_str()).map_err(|source| CacheError::Connect {
            url: display_url.clone(),
            source,
        })?;
        let connection = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::ConnectTimeout {
                url: display_url.clone(),
            })?
            .map_err(|source| CacheError::Connect {
                url: display_url,
                source,
            })?;
        Ok(Self {
            connection,
            key_prefix: key_prefix.into(),
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1),
        })
    }

    fn key(&self, id: &ResponseId) -> String {
        format!("{}{id}", self.key_prefix)
    }
}

#[async_trait]
impl ResponseCache for RedisResponseCache {
    async fn append(&self, id: &ResponseId, entry: &CachedEvent) -> Result<(), CacheError> {
        let payload = serde_json::to_string(entry).map_err(CacheError::Encode)?;
        let key = self.key(id);
        let mut connection = self.connection.clone();
        let (): () = redis::pipe()
            .atomic()
            .rpush(&key, payload)
            .ignore()
            .expire(&key, self.ttl_secs)
            .ignore()
            .query_async(&mut connection)
            .await?;
        Ok(())
    }

    async fn get(&self, id: &ResponseId) -> Result<Option<CachedLog>, CacheError> {
        let mut connection = self.connection.clone();
        let raw: Vec<String> = connection.lrange(self.key(id), 0, -1).await?;
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(CachedLog::new(decode_entries(id, &raw))))
    }
}

/// Decodes stored entries, dropping any that no longer match the schema.
fn decode_entries(id: &ResponseId, raw: &[String]) -> Vec<CachedEvent> {
    raw.iter()
        .enumerate()
        .filter_map(|(position, text)| match serde_json::from_str(text) {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(
                    target: CACHE_TARGET,
                    response_id = %id,
                    position,
                    %error,
                    "dropping undecodable cache entry"
                );
                None
            }
        })
        .collect()
}

fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.password().is_some() && shown.set_password(Some("***")).is_err() {
        return format!("{}://<redacted>", url.scheme());
    }
    shown.to_string()
}
