//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::Stream;
use tracing::{info, warn};

use crate::state::{AppState, Field};
use super::{
    events::sse_stream,
    responses::{ApiResponse, HealthResponse, InputRequest, StatusResponse},
};

/// Handle POST /input/:field - Apply a text change to hours, minutes or seconds
pub async fn input_handler(
    State(state): State<Arc<AppState>>,
    Path(field): Path<Field>,
    Json(request): Json<InputRequest>,
) -> Json<ApiResponse> {
    let timer = state.change_input(field, &request.text);
    info!("Input endpoint called - {} set to {}", field.name(), timer.get(field));

    Json(ApiResponse::ok(
        format!("{} set to {}", field.name(), timer.get(field)),
        timer,
    ))
}

/// Handle POST /toggle - Start the countdown when idle, stop it when running
pub async fn toggle_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    match state.toggle() {
        Ok(timer) => {
            let message = if timer.phase.is_running() {
                format!("Countdown started from {}", timer.display)
            } else {
                format!("Countdown stopped, restored {}", timer.display)
            };
            info!("Toggle endpoint called - {}", message);
            Json(ApiResponse::ok(message, timer))
        }
        Err(e) => {
            warn!("Toggle endpoint rejected - {}", e);
            Json(ApiResponse::error(e, state.snapshot()))
        }
    }
}

/// Handle GET /status - Return current timer status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_action, last_action_time) = state.get_last_action();
    let (completed_sessions, last_completed_at) = state.get_completions();

    Json(StatusResponse {
        timer: state.snapshot(),
        completed_sessions,
        last_completed_at,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /events - Stream timer changes as server-sent events
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Event stream client connected");
    Sse::new(sse_stream(&state)).keep_alive(KeepAlive::default())
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
