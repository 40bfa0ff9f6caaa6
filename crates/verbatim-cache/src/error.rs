//! Cache failure modes.

use thiserror::Error;

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An entry could not be serialised for storage.
    #[error("failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),
    /// The durable store could not be reached or configured.
    #[error("failed to connect to cache at '{url}': {source}")]
    Connect {
        /// Address of the store, without credentials.
        url: String,
        /// Underlying client error.
        #[source]
        source: redis::RedisError,
    },
    /// The durable store did not answer within the connection deadline.
    #[error("timed out connecting to cache at '{url}'")]
    ConnectTimeout {
        /// Address of the store, without credentials.
        url: String,
    },
    /// A command against the durable store failed.
    #[error("cache command failed: {0}")]
    Backend(#[from] redis::RedisError),
}
