//! Layered configuration for the Verbatim daemon.
//!
//! Values resolve in increasing precedence from built-in defaults, a TOML file
//! (`--config-path` or `VERBATIM_CONFIG_PATH`), `VERBATIM_*` environment
//! variables, and finally command-line flags.

mod defaults;
mod logging;

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use url::Url;

pub use defaults::{
    DEFAULT_CACHE_KEY_PREFIX, DEFAULT_CACHE_MAX_RESPONSES, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_COMPLETION_MODEL, DEFAULT_COMPLETION_URL, DEFAULT_HEARTBEAT_INTERVAL_MS,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_PASSAGES, DEFAULT_MAX_QUESTION_CHARS, DEFAULT_PORT,
    DEFAULT_SEARCH_URL, default_cache_key_prefix, default_completion_model,
    default_completion_url, default_listen_address, default_log_filter,
    default_log_filter_string, default_log_format, default_search_url,
};
pub use logging::{
    DEPENDENCY_LOG_LEVEL, DEPENDENCY_LOG_TARGETS, LogFormat, LogFormatParseError,
    effective_log_filter,
};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "VERBATIM")]
pub struct Config {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_address")]
    #[ortho_config(default = default_listen_address())]
    pub listen_address: SocketAddr,
    /// `tracing` filter directive.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Redis URL for the durable response cache; unset uses local memory.
    #[serde(default)]
    pub cache_url: Option<Url>,
    /// Key namespace for durable response logs.
    #[serde(default = "default_cache_key_prefix")]
    #[ortho_config(default = default_cache_key_prefix())]
    pub cache_key_prefix: String,
    /// Sliding expiry of a response log, in seconds.
    #[serde(default = "cache_ttl_secs_default")]
    #[ortho_config(default = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl_secs: u64,
    /// Bound on logs tracked by the in-memory cache.
    #[serde(default = "cache_max_responses_default")]
    #[ortho_config(default = DEFAULT_CACHE_MAX_RESPONSES)]
    pub cache_max_responses: usize,
    /// Heartbeat period, in milliseconds.
    #[serde(default = "heartbeat_interval_ms_default")]
    #[ortho_config(default = DEFAULT_HEARTBEAT_INTERVAL_MS)]
    pub heartbeat_interval_ms: u64,
    /// OpenAI-compatible streaming chat completion endpoint.
    #[serde(default = "default_completion_url")]
    #[ortho_config(default = default_completion_url())]
    pub completion_url: Url,
    /// Model name sent to the completion endpoint.
    #[serde(default = "default_completion_model")]
    #[ortho_config(default = default_completion_model())]
    pub completion_model: String,
    /// Bearer token for the completion endpoint.
    #[serde(default)]
    pub completion_api_key: Option<String>,
    /// Passage search endpoint.
    #[serde(default = "default_search_url")]
    #[ortho_config(default = default_search_url())]
    pub search_url: Url,
    /// Upper bound on passages requested per question.
    #[serde(default = "max_passages_default")]
    #[ortho_config(default = DEFAULT_MAX_PASSAGES)]
    pub max_passages: usize,
    /// Upper bound on question length, in characters.
    #[serde(default = "max_question_chars_default")]
    #[ortho_config(default = DEFAULT_MAX_QUESTION_CHARS)]
    pub max_question_chars: usize,
}

fn cache_ttl_secs_default() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn cache_max_responses_default() -> usize {
    DEFAULT_CACHE_MAX_RESPONSES
}

fn heartbeat_interval_ms_default() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

fn max_passages_default() -> usize {
    DEFAULT_MAX_PASSAGES
}

fn max_question_chars_default() -> usize {
    DEFAULT_MAX_QUESTION_CHARS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            cache_url: None,
            cache_key_prefix: default_cache_key_prefix(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_max_responses: DEFAULT_CACHE_MAX_RESPONSES,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            completion_url: default_completion_url(),
            completion_model: default_completion_model(),
            completion_api_key: None,
            search_url: default_search_url(),
            max_passages: DEFAULT_MAX_PASSAGES,
            max_question_chars: DEFAULT_MAX_QUESTION_CHARS,
        }
    }
}

impl Config {
    /// Address the HTTP server binds to.
    #[must_use]
    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// `tracing` filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Redis URL, when a durable cache is configured.
    #[must_use]
    pub fn cache_url(&self) -> Option<&Url> {
        self.cache_url.as_ref()
    }

    /// Key namespace for durable response logs.
    #[must_use]
    pub fn cache_key_prefix(&self) -> &str {
        &self.cache_key_prefix
    }

    /// Sliding expiry of a response log.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Bound on logs tracked by the in-memory cache.
    #[must_use]
    pub fn cache_max_responses(&self) -> usize {
        self.cache_max_responses
    }

    /// Heartbeat period. A zero setting is raised to one millisecond.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    /// Streaming completion endpoint.
    #[must_use]
    pub fn completion_url(&self) -> &Url {
        &self.completion_url
    }

    /// Model name sent to the completion endpoint.
    #[must_use]
    pub fn completion_model(&self) -> &str {
        &self.completion_model
    }

    /// Bearer token for the completion endpoint.
    #[must_use]
    pub fn completion_api_key(&self) -> Option<&str> {
        self.completion_api_key.as_deref()
    }

    /// Passage search endpoint.
    #[must_use]
    pub fn search_url(&self) -> &Url {
        &self.search_url
    }

    /// Upper bound on passages requested per question.
    #[must_use]
    pub fn max_passages(&self) -> usize {
        self.max_passages
    }

    /// Upper bound on question length, in characters.
    #[must_use]
    pub fn max_question_chars(&self) -> usize {
        self.max_question_chars
    }
}
