//! Shipped collaborator implementations.

mod augment;
mod openai;
mod search;
mod suggestions;

use std::sync::Arc;
use std::time::Duration;

use verbatim_config::Config;

use crate::collaborators::{Collaborators, UpstreamError};

pub use self::augment::PassthroughAugmenter;
pub use self::openai::{OpenAiCompletionProvider, UpstreamPayload};
pub use self::search::HttpPassageSearch;
pub use self::suggestions::{CompletionSuggestionGenerator, fallback_suggestions, parse_suggestions};

/// Tracing target for upstream service diagnostics.
pub(crate) const UPSTREAM_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::upstream");

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the HTTP-backed collaborators described by `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub fn http_collaborators(config: &Config) -> Result<Collaborators, UpstreamError> {
    // No overall request timeout: completions stream for as long as the model
    // generates, and heartbeats keep the client connection alive meanwhile.
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(UpstreamError::Request)?;

    let completion = Arc::new(OpenAiCompletionProvider::new(
        client.clone(),
        config.completion_url().clone(),
        config.completion_model(),
        config.completion_api_key().map(str::to_owned),
    ));
    Ok(Collaborators {
        augmenter: Arc::new(PassthroughAugmenter),
        search: Arc::new(HttpPassageSearch::new(
            client,
            config.search_url().clone(),
            config.max_passages(),
        )),
        suggestions: Arc::new(CompletionSuggestionGenerator::new(completion.clone())),
        completion,
    })
}
