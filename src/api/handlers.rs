//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    error::TimerError,
    state::{AppState, TimerSnapshot},
};
use super::responses::{ApiResponse, ErrorResponse, HealthResponse, StartRequest, StatusResponse};

type ApiResult = Result<Json<ApiResponse>, (StatusCode, Json<ErrorResponse>)>;

/// Map an engine error onto an HTTP status with a JSON body
fn reject(action: &str, e: TimerError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        TimerError::InvalidDuration { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        TimerError::SessionInProgress(_) => StatusCode::CONFLICT,
        TimerError::EngineStopped => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        error!("{} failed: {}", action, e);
    } else {
        warn!("{} rejected: {}", action, e);
    }
    (status, Json(ErrorResponse::new(e.to_string())))
}

fn respond(
    state: &AppState,
    action: &str,
    message: &str,
    result: Result<TimerSnapshot, TimerError>,
) -> ApiResult {
    let snapshot = result.map_err(|e| reject(action, e))?;
    state.record_action(action);
    info!("{} endpoint called - session {}", action, snapshot.status);
    Ok(Json(ApiResponse::new(message.to_string(), snapshot)))
}

/// Handle POST /start - Begin a session of the requested length
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> ApiResult {
    let result = state.timer.start(request.minutes).await;
    let message = format!("{} minute session started", request.minutes);
    respond(&state, "start", &message, result)
}

/// Handle POST /pause - Pause the running session
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let result = state.timer.pause().await;
    respond(&state, "pause", "Session paused", result)
}

/// Handle POST /resume - Resume the paused session
pub async fn resume_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let result = state.timer.resume().await;
    respond(&state, "resume", "Session resumed", result)
}

/// Handle POST /end - Abandon the current session
pub async fn end_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let result = state.timer.end().await;
    respond(&state, "end", "Session ended", result)
}

/// Handle POST /acknowledge - Dismiss a completed session
pub async fn acknowledge_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let result = state.timer.acknowledge().await;
    respond(&state, "acknowledge", "Completion acknowledged", result)
}

/// Handle GET /status - Return the live timer snapshot
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_action, last_action_time) = state.get_last_action();
    let last_tick = *state.timer.ticks().borrow();

    Json(StatusResponse {
        timer: state.timer.snapshot(),
        label: state.timer.frame().label,
        last_tick,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /events - Stream lifecycle and boundary events
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state.timer.subscribe();

    let stream = stream::unfold(events, |mut events| async move {
        loop {
            match events.recv().await {
                Ok(event) => match Event::default().event(event.name()).json_data(&event) {
                    Ok(sse) => return Some((Ok(sse), events)),
                    Err(e) => warn!("Failed to encode {} event: {}", event.name(), e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
