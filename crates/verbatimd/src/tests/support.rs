//! Test harness utilities shared by the daemon suites.

use std::ffi::OsString;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use ortho_config::{OrthoConfig, OrthoError};

use verbatim_cache::{CacheBackend, CacheError, ResponseCache};
use verbatim_config::Config;
use verbatim_stream::WireSender;
use verbatim_types::{CachedLog, Fragment, Passage, ResponseId};

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, bootstrap_with};
use crate::collaborators::{
    Collaborators, CompletionProvider, CompletionRequest, FragmentStream, PassageSearch,
    SearchError, SuggestionGenerator, UpstreamError,
};
use crate::error::{ChatError, ErrorCode};
use crate::health::HealthReporter;
use crate::orchestrator::AnswerRequest;
use crate::upstream::PassthroughAugmenter;

/// Loader returning defaults with an ephemeral listen port.
pub struct TestConfigLoader;

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            listen_address: "127.0.0.1:0".parse().expect("valid socket address"),
            ..Config::default()
        })
    }
}

/// Loader returning defaults plus an unreachable durable cache.
pub struct UnreachableCacheLoader;

impl ConfigLoader for UnreachableCacheLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            listen_address: "127.0.0.1:0".parse().expect("valid socket address"),
            cache_url: Some("http://127.0.0.1:9/".parse().expect("valid url")),
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("verbatimd"),
            OsString::from("--listen-address"),
            OsString::from("not-an-address"),
        ];
        Config::load_from_iter(args)
    }
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn cache_ready(&self, backend: CacheBackend) {
        self.record(HealthEvent::CacheReady(backend));
    }

    fn cache_fallback(&self, _error: &CacheError) {
        self.record(HealthEvent::CacheFallback);
    }

    fn cache_append_failed(&self, id: &ResponseId, _error: &CacheError) {
        self.record(HealthEvent::CacheAppendFailed(id.clone()));
    }

    fn response_started(&self, id: &ResponseId) {
        self.record(HealthEvent::ResponseStarted(id.clone()));
    }

    fn response_completed(&self, id: &ResponseId) {
        self.record(HealthEvent::ResponseCompleted(id.clone()));
    }

    fn response_failed(&self, id: &ResponseId, error: &ChatError) {
        self.record(HealthEvent::ResponseFailed(id.clone(), error.code()));
    }

    fn suggestions_degraded(&self, id: &ResponseId, _error: &ChatError) {
        self.record(HealthEvent::SuggestionsDegraded(id.clone()));
    }
}

/// Structured health events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The cache backend was connected.
    CacheReady(CacheBackend),
    /// The durable cache was unusable.
    CacheFallback,
    /// An append for the response failed.
    CacheAppendFailed(ResponseId),
    /// A response started.
    ResponseStarted(ResponseId),
    /// A response ended with `done`.
    ResponseCompleted(ResponseId),
    /// A response ended with `error`.
    ResponseFailed(ResponseId, ErrorCode),
    /// Suggestions fell back to the fixed list.
    SuggestionsDegraded(ResponseId),
}

/// Search returning the same passages for every query.
pub struct StaticSearch(pub Vec<Passage>);

#[async_trait]
impl PassageSearch for StaticSearch {
    async fn search(
        &self,
        _query: &str,
        _session_hint: Option<&str>,
    ) -> Result<Vec<Passage>, SearchError> {
        Ok(self.0.clone())
    }
}

/// Completion replaying fixed fragments.
pub struct StaticCompletion(pub Vec<&'static str>);

#[async_trait]
impl CompletionProvider for StaticCompletion {
    async fn stream(&self, _request: CompletionRequest) -> Result<FragmentStream, UpstreamError> {
        let fragments: Vec<Result<Fragment, UpstreamError>> =
            self.0.iter().map(|text| Ok(Fragment::text(*text))).collect();
        Ok(stream::iter(fragments).boxed())
    }
}

/// Suggestions that never vary.
pub struct StaticSuggestions;

#[async_trait]
impl SuggestionGenerator for StaticSuggestions {
    async fn suggest(
        &self,
        _question: &str,
        _answer: &str,
        _intent: &str,
    ) -> Result<Vec<String>, UpstreamError> {
        Ok(vec![String::from("What else did Ra say?")])
    }
}

/// Collaborators answering every question with one quoted passage.
pub fn static_collaborators() -> Collaborators {
    Collaborators {
        augmenter: Arc::new(PassthroughAugmenter),
        search: Arc::new(StaticSearch(vec![Passage::new(
            "1.1",
            "Ra: I am Ra. Example.",
            "https://example.test/1.1",
        )])),
        completion: Arc::new(StaticCompletion(vec!["Ra said: ", "{{QUOTE:1:s", "2:s2}}", " Done."])),
        suggestions: Arc::new(StaticSuggestions),
    }
}

/// Scenario world for the daemon bootstrap suite.
pub struct DaemonWorld {
    runtime: tokio::runtime::Runtime,
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
    answered: Option<ResponseId>,
}

impl DaemonWorld {
    /// Builds a world with a successful configuration loader.
    pub fn new() -> Self {
        Self {
            runtime: tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("test runtime"),
            loader: Box::new(TestConfigLoader),
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            bootstrap_error: None,
            answered: None,
        }
    }

    /// Replaces the configuration loader.
    pub fn use_loader(&mut self, loader: Box<dyn ConfigLoader>) {
        self.loader = loader;
        self.daemon = None;
        self.bootstrap_error = None;
        self.answered = None;
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        let reporter: Arc<dyn HealthReporter> = self.reporter.clone();
        let result = self.runtime.block_on(bootstrap_with(&*self.loader, reporter));
        match result {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// The bootstrapped daemon, if any.
    pub fn daemon(&self) -> Option<&Daemon> {
        self.daemon.as_ref()
    }

    /// The bootstrap error, if any.
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Answers `question` through the daemon's orchestrator.
    pub fn answer(&mut self, question: &str) -> Result<(), String> {
        let daemon = self.daemon.as_ref().ok_or("daemon was not bootstrapped")?;
        let orchestrator = daemon.orchestrator(static_collaborators());
        let id = ResponseId::parse("bdd-response").map_err(|error| error.to_string())?;
        let (wire, _frames) = WireSender::channel();
        self.runtime
            .block_on(orchestrator.run(&id, &AnswerRequest::new(question), wire));
        self.answered = Some(id);
        Ok(())
    }

    /// The cached log of the last answer.
    pub fn answered_log(&self) -> Result<Option<CachedLog>, String> {
        let daemon = self.daemon.as_ref().ok_or("daemon was not bootstrapped")?;
        let id = self.answered.as_ref().ok_or("no question was answered")?;
        self.runtime
            .block_on(daemon.cache().get(id))
            .map_err(|error| error.to_string())
    }
}

impl Default for DaemonWorld {
    fn default() -> Self {
        Self::new()
    }
}
