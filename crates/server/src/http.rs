//! HTTP ingress: the change hook, health and metrics.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use barrio_common::{AppError, AppResult, Metrics};
use barrio_listener::{ChangeHandler, EventTasks, decode_change};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, warn};

/// Largest change event body accepted over HTTP.
const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct HookState {
    /// Receives accepted change events.
    pub handler: Arc<dyn ChangeHandler>,
    /// Counters served on `/metrics`.
    pub metrics: Arc<Metrics>,
    /// Per-event tasks, drained at shutdown.
    pub tasks: EventTasks,
}

/// Build the HTTP router.
pub fn router(state: HookState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .route("/hooks/changes", post(receive_change))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_EVENT_BYTES)),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn prometheus_metrics(State(state): State<HookState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.to_prometheus(),
    )
        .into_response()
}

/// Accept a change event and route it in the background.
///
/// The caller gets 202 as soon as the body decodes. Handler failures are
/// logged by the router and never reach the caller. Once shutdown has
/// drained the task set, events are refused with 503.
async fn receive_change(State(state): State<HookState>, body: Bytes) -> AppResult<StatusCode> {
    let payload =
        std::str::from_utf8(&body).map_err(|e| AppError::MalformedEvent(e.to_string()))?;
    let event = decode_change(payload)?;
    debug!(path = %event.path, kind = ?event.kind, "Accepted change event over HTTP");

    let handler = state.handler.clone();
    if !state.tasks.spawn(async move { handler.on_change(event).await }) {
        warn!("Refusing change event during shutdown");
        return Ok(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(StatusCode::ACCEPTED)
}
