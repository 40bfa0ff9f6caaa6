//! Structured logging for the daemon.
//!
//! Every answer runs inside a [`response_span`], so each line a response
//! produces (orchestrator stages, upstream calls, cache writes) carries its
//! `response_id`. JSON output flattens event fields and attaches the current
//! span; compact output prefixes the span name and fields.
//!
//! The global subscriber is installed once per process. The filter is parsed
//! on every call so a bad directive is reported even after installation.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::{Span, Subscriber, info_span};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

use verbatim_config::{Config, LogFormat, effective_log_filter};
use verbatim_types::ResponseId;

/// Target of the per-response span.
pub const RESPONSE_SPAN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::response");

static INSTALLED_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Proof that logging is set up, recording the format actually installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Format of the process-wide subscriber, which is the format requested by
    /// the first successful call to [`initialise`].
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter, extended with dependency defaults, did not parse.
    #[error("invalid log filter {directives:?}: {reason}")]
    Filter {
        /// Directives handed to the parser.
        directives: String,
        /// Parser message.
        reason: String,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the process-wide subscriber on the first call.
///
/// # Examples
///
/// ```rust
/// use verbatim_config::{Config, LogFormat};
/// use verbatimd::telemetry;
///
/// # fn main() -> Result<(), verbatimd::TelemetryError> {
/// let handle = telemetry::initialise(&Config::default())?;
/// let compact = Config { log_format: LogFormat::Compact, ..Config::default() };
/// assert_eq!(telemetry::initialise(&compact)?.format(), handle.format());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter and
/// [`TelemetryError::Subscriber`] if another subscriber already owns the
/// process.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let filter = parse_filter(config.log_filter())?;
    let format = INSTALLED_FORMAT.get_or_try_init(|| {
        install(filter, config.log_format()).map(|()| config.log_format())
    })?;
    Ok(TelemetryHandle { format: *format })
}

/// Span enclosing all work for one response.
pub fn response_span(id: &ResponseId) -> Span {
    info_span!(target: RESPONSE_SPAN_TARGET, "response", response_id = %id)
}

fn parse_filter(configured: &str) -> Result<EnvFilter, TelemetryError> {
    let directives = effective_log_filter(configured);
    EnvFilter::try_new(&directives).map_err(|error| TelemetryError::Filter {
        reason: error.to_string(),
        directives,
    })
}

fn install(filter: EnvFilter, format: LogFormat) -> Result<(), TelemetryError> {
    let colour = !format.is_machine_readable() && io::stderr().is_terminal();
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(colour)
        .with_timer(UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(
            builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(builder.compact().with_target(false).finish()),
    };
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
