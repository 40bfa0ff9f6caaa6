//! Daemon bootstrap orchestration.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tokio::net::TcpListener;

use verbatim_cache::{CacheBackend, CacheSettings, ResponseCache, connect};
use verbatim_config::Config;

use crate::collaborators::Collaborators;
use crate::health::HealthReporter;
use crate::orchestrator::{Orchestrator, OrchestratorSettings};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{self, AppState};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Errors surfaced while serving.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listen address could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Configured listen address.
        address: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The server loop failed.
    #[error("server failed: {0}")]
    Serve(#[source] io::Error),
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    cache: Arc<dyn ResponseCache>,
    backend: CacheBackend,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Daemon")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the connected response cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.cache
    }

    /// Backend selected for the response cache.
    #[must_use]
    pub fn cache_backend(&self) -> CacheBackend {
        self.backend
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Builds the orchestrator for `collaborators`.
    #[must_use]
    pub fn orchestrator(&self, collaborators: Collaborators) -> Orchestrator {
        Orchestrator::new(
            collaborators,
            Arc::clone(&self.cache),
            Arc::clone(&self.reporter),
            OrchestratorSettings::from_config(&self.config),
        )
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError`] if binding or serving fails.
    pub async fn serve<F>(self, collaborators: Collaborators, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.config.listen_address();
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServeError::Bind { address, source })?;
        let router = transport::router(AppState::new(Arc::new(self.orchestrator(collaborators))));
        transport::serve(listener, router, shutdown)
            .await
            .map_err(ServeError::Serve)
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// An unreachable durable cache is not fatal: the daemon falls back to the
/// in-memory backend and reports the fallback.
pub async fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let connected = connect(&cache_settings(&config)).await;
    if let Some(reason) = &connected.fallback_reason {
        reporter.cache_fallback(reason);
    }
    reporter.cache_ready(connected.backend);
    reporter.bootstrap_succeeded(&config);

    Ok(Daemon {
        config,
        cache: connected.cache,
        backend: connected.backend,
        telemetry,
        reporter,
    })
}

fn cache_settings(config: &Config) -> CacheSettings {
    CacheSettings {
        url: config.cache_url().cloned(),
        key_prefix: config.cache_key_prefix().to_owned(),
        ttl: config.cache_ttl(),
        max_responses: config.cache_max_responses(),
    }
}
