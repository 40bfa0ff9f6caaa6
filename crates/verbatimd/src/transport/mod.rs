//! HTTP surface of the daemon.
//!
//! `POST /v1/answers` starts a response and streams its events. The
//! orchestrator runs in its own task, so a client that disconnects never cuts
//! generation short and the log stays replayable through
//! `GET /v1/answers/:id`.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{Instrument, info, warn};
use uuid::Uuid;

use verbatim_cache::ResponseCache;
use verbatim_stream::WireSender;
use verbatim_types::{CachedEvent, ResponseId};

use crate::orchestrator::{AnswerRequest, Orchestrator};
use crate::telemetry;

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Header carrying the id a client uses for recovery.
pub const RESPONSE_ID_HEADER: &str = "x-response-id";

const EVENT_STREAM: &str = "text/event-stream";

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Wraps an orchestrator for the router.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    fn cache(&self) -> &Arc<dyn ResponseCache> {
        self.orchestrator.cache()
    }
}

/// Builds the daemon router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/answers", post(start_answer))
        .route("/v1/answers/:id", get(recover_answer))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serves `router` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server loop fails.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local: Option<SocketAddr> = listener.local_addr().ok();
    info!(target: TRANSPORT_TARGET, address = ?local, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(target: TRANSPORT_TARGET, %error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(target: TRANSPORT_TARGET, %error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!(target: TRANSPORT_TARGET, "shutdown requested");
}

async fn start_answer(State(state): State<AppState>, Json(request): Json<AnswerRequest>) -> Response {
    let id = match ResponseId::parse(Uuid::new_v4().to_string()) {
        Ok(id) => id,
        Err(error) => {
            warn!(target: TRANSPORT_TARGET, %error, "generated response id was rejected");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let header_id = HeaderValue::from_str(id.as_str());

    let (wire, frames) = WireSender::channel();
    let orchestrator = Arc::clone(&state.orchestrator);
    let task_id = id.clone();
    let span = telemetry::response_span(&id);
    tokio::spawn(
        async move {
            orchestrator.run(&task_id, &request, wire).await;
        }
        .instrument(span),
    );

    let body = Body::from_stream(UnboundedReceiverStream::new(frames).map(Ok::<_, Infallible>));
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(value) = header_id {
        headers.insert(RESPONSE_ID_HEADER, value);
    }
    response
}

#[derive(Debug, Serialize)]
struct RecoveredLog {
    events: Vec<CachedEvent>,
    complete: bool,
}

async fn recover_answer(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Ok(id) = ResponseId::parse(raw) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match state.cache().get(&id).await {
        Ok(Some(log)) => {
            let complete = log.complete();
            Json(RecoveredLog {
                events: log.into_events(),
                complete,
            })
            .into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(error) => {
            warn!(target: TRANSPORT_TARGET, response_id = %id, %error, "cache lookup failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
