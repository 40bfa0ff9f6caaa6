//! The Verbatim answer daemon.
//!
//! A question arrives over HTTP, is augmented and matched against verified
//! passages, and is answered by a streaming language model whose quote
//! markers are replaced with the exact passage text before anything reaches
//! the client. Every event is framed onto the live event stream and recorded
//! to the response cache in the same order, so a client that drops the
//! connection can fetch the full answer later by its response id.
//!
//! Startup follows a fixed sequence: load configuration through
//! [`verbatim_config`], install structured telemetry, connect the response
//! cache (falling back to local memory when the durable store is unreachable),
//! then bind the HTTP transport. Health reporting hooks emit structured events
//! at each stage and for every response lifecycle transition.
//!
//! Failures are classified once into the [`ErrorCode`] taxonomy. Clients only
//! ever see the fixed sentence and retry hint for a code; causes stay in the
//! logs.

mod bootstrap;
pub mod collaborators;
pub mod error;
mod health;
pub mod orchestrator;
pub mod prompt;
pub mod telemetry;
pub mod transport;
pub mod upstream;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, ServeError, SystemConfigLoader, bootstrap_with,
};
pub use error::{ChatError, ErrorCode, ErrorDescriptor, Stage};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use orchestrator::{AnswerRequest, Orchestrator, OrchestratorSettings, ResponseOutcome};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use upstream::http_collaborators;

#[cfg(test)]
mod tests;
