//! Structured health reporting for daemon and response lifecycle events.

use std::sync::Arc;

use verbatim_cache::{AppendFailureHandler, CacheBackend, CacheError};
use verbatim_config::Config;
use verbatim_types::{CachedEvent, ResponseId};

use crate::bootstrap::BootstrapError;
use crate::error::ChatError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the response cache backend is connected.
    fn cache_ready(&self, backend: CacheBackend);

    /// Invoked when the durable cache is configured but unusable.
    fn cache_fallback(&self, error: &CacheError);

    /// Invoked when a cache append fails; the entry is lost.
    fn cache_append_failed(&self, id: &ResponseId, error: &CacheError);

    /// Invoked when a response begins.
    fn response_started(&self, id: &ResponseId);

    /// Invoked when a response ends with `done`.
    fn response_completed(&self, id: &ResponseId);

    /// Invoked when a response ends with `error`.
    fn response_failed(&self, id: &ResponseId, error: &ChatError);

    /// Invoked when suggestions fell back to the fixed list.
    fn suggestions_degraded(&self, id: &ResponseId, error: &ChatError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn cache_ready(&self, backend: CacheBackend) {
        (**self).cache_ready(backend);
    }

    fn cache_fallback(&self, error: &CacheError) {
        (**self).cache_fallback(error);
    }

    fn cache_append_failed(&self, id: &ResponseId, error: &CacheError) {
        (**self).cache_append_failed(id, error);
    }

    fn response_started(&self, id: &ResponseId) {
        (**self).response_started(id);
    }

    fn response_completed(&self, id: &ResponseId) {
        (**self).response_completed(id);
    }

    fn response_failed(&self, id: &ResponseId, error: &ChatError) {
        (**self).response_failed(id, error);
    }

    fn suggestions_degraded(&self, id: &ResponseId, error: &ChatError) {
        (**self).suggestions_degraded(id, error);
    }
}

/// Routes cache writer failures to a [`HealthReporter`].
pub(crate) struct ReportAppendFailures(pub(crate) Arc<dyn HealthReporter>);

impl AppendFailureHandler for ReportAppendFailures {
    fn append_failed(&self, id: &ResponseId, _entry: &CachedEvent, error: &CacheError) {
        self.0.cache_append_failed(id, error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            listen_address = %config.listen_address(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn cache_ready(&self, backend: CacheBackend) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "cache_ready",
            backend = %backend,
            "response cache ready"
        );
    }

    fn cache_fallback(&self, error: &CacheError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "cache_fallback",
            error = %error,
            "durable response cache unavailable; using in-memory cache"
        );
    }

    fn cache_append_failed(&self, id: &ResponseId, error: &CacheError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "cache_append_failed",
            response_id = %id,
            error = %error,
            "response cache append failed"
        );
    }

    fn response_started(&self, id: &ResponseId) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "response_started",
            response_id = %id,
            "response started"
        );
    }

    fn response_completed(&self, id: &ResponseId) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "response_completed",
            response_id = %id,
            "response completed"
        );
    }

    fn response_failed(&self, id: &ResponseId, error: &ChatError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "response_failed",
            response_id = %id,
            code = %error.code(),
            cause = ?error.cause().map(ToString::to_string),
            "response failed"
        );
    }

    fn suggestions_degraded(&self, id: &ResponseId, error: &ChatError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "suggestions_degraded",
            response_id = %id,
            code = %error.code(),
            cause = ?error.cause().map(ToString::to_string),
            "suggestion generation failed; using fallback list"
        );
    }
}
