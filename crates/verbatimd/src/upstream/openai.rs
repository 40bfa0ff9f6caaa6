//! OpenAI-compatible streaming chat completions.
//!
//! The endpoint answers with an event stream whose `data:` lines are JSON
//! chunks, terminated by a literal `[DONE]`. Each payload is validated once,
//! here, into an [`UpstreamPayload`]; nothing downstream touches raw JSON.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use reqwest::StatusCode;
use reqwest_eventsource::{Event as SseEvent, EventSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use verbatim_types::{Fragment, Usage};

use super::UPSTREAM_TARGET;
use crate::collaborators::{
    ChatMessage, CompletionProvider, CompletionRequest, FragmentStream, UpstreamError,
};

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    stream_options: StreamOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkBody {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// One validated `data:` payload from the completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamPayload {
    /// Generated text and, on the final chunk, usage.
    Fragment(Fragment),
    /// End of the completion.
    Done,
    /// A payload that did not match the chunk schema.
    Invalid {
        /// Why validation failed.
        reason: String,
    },
}

impl UpstreamPayload {
    /// Validates one `data:` payload.
    #[must_use]
    pub fn parse(data: &str) -> Self {
        if data.trim() == DONE_SENTINEL {
            return Self::Done;
        }
        match serde_json::from_str::<ChunkBody>(data) {
            Ok(body) => {
                let content: String = body
                    .choices
                    .into_iter()
                    .filter_map(|choice| choice.delta.content)
                    .collect();
                Self::Fragment(Fragment {
                    content,
                    usage: body.usage.map(|usage| Usage {
                        prompt_tokens: usage.prompt_tokens,
                        completion_tokens: usage.completion_tokens,
                        total_tokens: usage.total_tokens,
                    }),
                })
            }
            Err(error) => Self::Invalid {
                reason: error.to_string(),
            },
        }
    }
}

/// Streaming client for an OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompletionProvider {
    client: reqwest::Client,
    url: Url,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompletionProvider {
    /// Creates a provider for `model` at `url`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        url: Url,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            url,
            model: model.into(),
            api_key,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, UpstreamError> {
        let body = ChatRequestBody {
            model: &self.model,
            messages: &request.messages,
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        let mut builder = self.client.post(self.url.clone()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let source = EventSource::new(builder).map_err(|error| UpstreamError::InvalidResponse {
            message: error.to_string(),
        })?;
        Ok(fragments(source))
    }
}

fn fragments(source: EventSource) -> FragmentStream {
    stream::unfold(Some(source), |state| async move {
        let mut source = state?;
        loop {
            match source.next().await {
                None | Some(Err(reqwest_eventsource::Error::StreamEnded)) => return None,
                Some(Ok(SseEvent::Open)) => {
                    debug!(target: UPSTREAM_TARGET, "completion stream opened");
                }
                Some(Ok(SseEvent::Message(message))) => match UpstreamPayload::parse(&message.data)
                {
                    UpstreamPayload::Fragment(fragment) => {
                        return Some((Ok(fragment), Some(source)));
                    }
                    UpstreamPayload::Done => {
                        source.close();
                        return None;
                    }
                    UpstreamPayload::Invalid { reason } => {
                        warn!(target: UPSTREAM_TARGET, %reason, "skipping invalid completion payload");
                    }
                },
                Some(Err(error)) => {
                    source.close();
                    return Some((Err(map_stream_error(error)), None));
                }
            }
        }
    })
    .boxed()
}

fn map_stream_error(error: reqwest_eventsource::Error) -> UpstreamError {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, _)
            if status == StatusCode::TOO_MANY_REQUESTS =>
        {
            UpstreamError::RateLimited
        }
        reqwest_eventsource::Error::InvalidStatusCode(status, _) => UpstreamError::Status {
            status: status.as_u16(),
        },
        reqwest_eventsource::Error::Transport(source) => UpstreamError::Request(source),
        other => UpstreamError::Stream {
            message: other.to_string(),
        },
    }
}
