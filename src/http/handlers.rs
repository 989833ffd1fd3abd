use super::state::AppState;
use crate::error::PitchroomError;
use crate::model::{Session, Transcript};
use crate::session::{StopReason, StopSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub deck_id: String,
    pub title: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
    pub attach_token: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn error_response(e: &PitchroomError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        PitchroomError::SessionNotFound { .. } | PitchroomError::QuestionNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        PitchroomError::SessionInactive { .. } => StatusCode::CONFLICT,
        PitchroomError::InvalidSession { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: e.code().to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions/start
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    info!("Starting session for deck: {}", req.deck_id);

    match state
        .orchestrator
        .start_session(&req.deck_id, req.title, req.owner_id)
        .await
    {
        Ok((session, attach_token)) => (
            StatusCode::OK,
            Json(StartSessionResponse {
                session_id: session.id,
                attach_token,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to start session: {}", e);
            error_response(&e).into_response()
        }
    }
}

/// POST /sessions/:session_id/stop
///
/// Optimistic: returns as soon as the session is marked ended;
/// finalization runs asynchronously.
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Stopping session: {}", session_id);

    match state
        .orchestrator
        .stop(&session_id, StopReason::Explicit)
        .await
    {
        Ok(snapshot) => (StatusCode::OK, Json::<StopSnapshot>(snapshot)).into_response(),
        Err(e) => {
            error!("Failed to stop session {}: {}", session_id, e);
            error_response(&e).into_response()
        }
    }
}

/// GET /sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.orchestrator.get_session(&session_id).await {
        Ok(session) => (StatusCode::OK, Json::<Session>(session)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// GET /sessions/:session_id/transcript
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.orchestrator.get_transcript(&session_id).await {
        Ok(entries) => (StatusCode::OK, Json::<Vec<Transcript>>(entries)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// POST /sessions/:session_id/questions/:question_id/answered
pub async fn mark_question_answered(
    State(state): State<AppState>,
    Path((session_id, question_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match state
        .orchestrator
        .mark_answered(&session_id, &question_id)
        .await
    {
        Ok(session) => (StatusCode::OK, Json::<Session>(session)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// DELETE /sessions/:session_id/questions/:question_id
pub async fn delete_question(
    State(state): State<AppState>,
    Path((session_id, question_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match state
        .orchestrator
        .delete_question(&session_id, &question_id)
        .await
    {
        Ok(session) => (StatusCode::OK, Json::<Session>(session)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
