//! Log output settings for the daemon.
//!
//! The HTTP client, the Redis client and the server stack log every request
//! at `debug` and most connection events at `info`. At the daemon's default
//! filter that drowns the per-response lines, so [`effective_log_filter`]
//! pins those crates to `warn` unless the operator names them explicitly.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Dependency crates pinned to [`DEPENDENCY_LOG_LEVEL`] by default.
pub const DEPENDENCY_LOG_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "redis", "reqwest"];

/// Level applied to [`DEPENDENCY_LOG_TARGETS`] the operator leaves unnamed.
pub const DEPENDENCY_LOG_LEVEL: &str = "warn";

/// Shape of each emitted log line.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per line, carrying the enclosing response span.
    #[default]
    Json,
    /// Single-line text for a terminal.
    Compact,
}

impl LogFormat {
    /// Whether lines are meant for a log pipeline rather than a person.
    ///
    /// Machine-readable output never carries terminal colour codes.
    #[must_use]
    pub const fn is_machine_readable(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Extends `filter` with a `warn` directive for each dependency crate it does
/// not already mention.
///
/// ```
/// use verbatim_config::effective_log_filter;
///
/// let filter = effective_log_filter("info,reqwest=debug");
/// assert!(filter.starts_with("info,reqwest=debug,"));
/// assert!(filter.contains("redis=warn"));
/// assert!(!filter.contains("reqwest=warn"));
/// ```
#[must_use]
pub fn effective_log_filter(filter: &str) -> String {
    let named: Vec<&str> = filter
        .split(',')
        .filter_map(|directive| directive.split('=').next())
        .map(|target| target.split(['[', ':']).next().unwrap_or(target).trim())
        .collect();

    let mut effective = filter.trim().to_owned();
    for target in DEPENDENCY_LOG_TARGETS {
        if named.contains(target) {
            continue;
        }
        if !effective.is_empty() {
            effective.push(',');
        }
        effective.push_str(target);
        effective.push('=');
        effective.push_str(DEPENDENCY_LOG_LEVEL);
    }
    effective
}
