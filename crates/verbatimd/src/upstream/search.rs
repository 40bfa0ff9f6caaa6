use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use verbatim_types::Passage;

use super::UPSTREAM_TARGET;
use crate::collaborators::{PassageSearch, SearchError};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_hint: Option<&'a str>,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    passages: Vec<Passage>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchFailureBody {
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Passage search over HTTP.
///
/// Posts `{query, session_hint, limit}` as JSON and expects
/// `{"passages": [...]}`.
#[derive(Debug, Clone)]
pub struct HttpPassageSearch {
    client: reqwest::Client,
    url: Url,
    limit: usize,
}

impl HttpPassageSearch {
    /// Creates a search client requesting at most `limit` passages.
    #[must_use]
    pub fn new(client: reqwest::Client, url: Url, limit: usize) -> Self {
        Self { client, url, limit }
    }
}

#[async_trait]
impl PassageSearch for HttpPassageSearch {
    async fn search(
        &self,
        query: &str,
        session_hint: Option<&str>,
    ) -> Result<Vec<Passage>, SearchError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&SearchRequest {
                query,
                session_hint,
                limit: self.limit,
            })
            .send()
            .await
            .map_err(SearchError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let mut parsed: SearchResponse = response.json().await.map_err(SearchError::Request)?;
        parsed.passages.truncate(self.limit);
        debug!(
            target: UPSTREAM_TARGET,
            passages = parsed.passages.len(),
            "passage search completed"
        );
        Ok(parsed.passages)
    }
}

/// Maps an unsuccessful search reply to a [`SearchError`].
///
/// `429` is rate limiting. `424`, or a JSON body naming the `embedding`
/// stage, is an embedding failure. Anything else is a search failure.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> SearchError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return SearchError::RateLimited;
    }
    let detail: SearchFailureBody = serde_json::from_str(body).unwrap_or_default();
    let message = detail
        .message
        .unwrap_or_else(|| format!("search service returned {status}"));
    let embedding_stage = detail.stage.as_deref() == Some("embedding");
    if status == StatusCode::FAILED_DEPENDENCY || embedding_stage {
        SearchError::Embedding { message }
    } else {
        SearchError::Failed { message }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn too_many_requests_is_rate_limited() {
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, ""),
            SearchError::RateLimited
        ));
    }

    #[rstest]
    #[case(StatusCode::FAILED_DEPENDENCY, "")]
    #[case(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"stage":"embedding","message":"model offline"}"#
    )]
    fn embedding_failures_are_recognised(#[case] status: StatusCode, #[case] body: &str) {
        assert!(matches!(
            classify_failure(status, body),
            SearchError::Embedding { .. }
        ));
    }

    #[rstest]
    fn other_failures_keep_the_service_message() {
        match classify_failure(
            StatusCode::BAD_GATEWAY,
            r#"{"stage":"vector","message":"index unavailable"}"#,
        ) {
            SearchError::Failed { message } => assert_eq!(message, "index unavailable"),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[rstest]
    fn unparseable_bodies_fall_back_to_the_status() {
        match classify_failure(StatusCode::SERVICE_UNAVAILABLE, "<html>") {
            SearchError::Failed { message } => assert!(message.contains("503")),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[rstest]
    fn request_omits_absent_session_hint() {
        let json = serde_json::to_value(SearchRequest {
            query: "q",
            session_hint: None,
            limit: 3,
        })
        .expect("serialise");
        assert_eq!(json, serde_json::json!({"query": "q", "limit": 3}));
    }
}
