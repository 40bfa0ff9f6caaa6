use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use url::Url;

use crate::logging::LogFormat;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8787;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default key namespace for durable response logs.
pub const DEFAULT_CACHE_KEY_PREFIX: &str = "verbatim:response:";

/// Default sliding expiry of a response log, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Default bound on logs tracked by the in-memory cache.
pub const DEFAULT_CACHE_MAX_RESPONSES: usize = 1000;

/// Default heartbeat period, in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 15_000;

/// Default OpenAI-compatible streaming completion endpoint.
pub const DEFAULT_COMPLETION_URL: &str = "http://127.0.0.1:11434/v1/chat/completions";

/// Default model name sent to the completion endpoint.
pub const DEFAULT_COMPLETION_MODEL: &str = "default";

/// Default passage search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "http://127.0.0.1:8788/search";

/// Default upper bound on passages requested per question.
pub const DEFAULT_MAX_PASSAGES: usize = 8;

/// Default upper bound on question length, in characters.
pub const DEFAULT_MAX_QUESTION_CHARS: usize = 2000;

/// Default bind address.
pub fn default_listen_address() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT))
}

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned cache key prefix.
pub fn default_cache_key_prefix() -> String {
    DEFAULT_CACHE_KEY_PREFIX.to_owned()
}

/// Owned completion model name.
pub fn default_completion_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_owned()
}

/// Parsed default completion endpoint.
pub fn default_completion_url() -> Url {
    parse_builtin(DEFAULT_COMPLETION_URL)
}

/// Parsed default search endpoint.
pub fn default_search_url() -> Url {
    parse_builtin(DEFAULT_SEARCH_URL)
}

fn parse_builtin(raw: &'static str) -> Url {
    match Url::parse(raw) {
        Ok(url) => url,
        // The built-in constants are covered by unit tests.
        Err(error) => panic!("built-in URL '{raw}' is invalid: {error}"),
    }
}
