use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use reschedular_engine::{Event, EventLike, HandleError, Outcome, Reschedular};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/events", post(handle_event))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Clone)]
pub struct AppState {
    engine: Reschedular,
    request_timeout: Duration,
    fatal: Arc<watch::Sender<bool>>,
}

impl AppState {
    /// `fatal` flips to `true` the first time handling fails unrecoverably.
    pub fn new(engine: Reschedular, request_timeout: Duration, fatal: watch::Sender<bool>) -> Self {
        Self {
            engine,
            request_timeout,
            fatal: Arc::new(fatal),
        }
    }
}

#[derive(Serialize)]
struct Handled {
    #[serde(flatten)]
    outcome: Outcome,
    /// Whether a follow-up event was queued for delivery.
    queued: bool,
}

async fn handle_event(State(state): State<AppState>, Json(event): Json<Event>) -> Response {
    let event_type = event.name();

    // Handling runs in its own task so a timed-out request never cuts a call
    // off between its write and its follow-up.
    let engine = state.engine.clone();
    let fatal = state.fatal.clone();
    let task = tokio::spawn(async move {
        let result = engine.handle(event).await;
        if matches!(&result, Err(e) if e.is_fatal()) {
            error!(event_type, "Fatal handling error, requesting shutdown");
            fatal.send_replace(true);
        }
        result
    });

    let result = match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            error!(event_type, error = %join_error, "Event handling task failed, requesting shutdown");
            state.fatal.send_replace(true);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "event handling failed");
        }
        Err(_) => {
            warn!(
                event_type,
                timeout_secs = state.request_timeout.as_secs(),
                "Event handling timed out, finishing in the background"
            );
            return error_response(StatusCode::GATEWAY_TIMEOUT, "event handling timed out");
        }
    };

    match result {
        Ok(outcome) => Json(Handled {
            outcome,
            queued: true,
        })
        .into_response(),
        Err(e) => error_response(status_for(&e), &e.to_string()),
    }
}

fn status_for(err: &HandleError) -> StatusCode {
    match err {
        HandleError::NotFound { .. } => StatusCode::NOT_FOUND,
        HandleError::Malformed(_) => StatusCode::BAD_REQUEST,
        HandleError::QueryFailed { .. } => StatusCode::BAD_GATEWAY,
        HandleError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "queue_depth": state.engine.queue().len(),
    }))
}
