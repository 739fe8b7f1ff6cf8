use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::models::{AppState, CreateSessionResponse, CredentialRequest, StatusResponse};
use crate::session::SessionSnapshot;
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{session_id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{session_id}/credential", put(set_credential))
        .with_state(state)
}

async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.sessions.insert(state.new_session()).await;
    info!(%session_id, "Session created");
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<SessionSnapshot>> {
    let session = state.sessions.get(&session_id).await?;
    let snapshot = session.lock().await.snapshot();
    Ok(Json(snapshot))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.sessions.remove(&session_id).await {
        info!(%session_id, "Session closed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("session {}", session_id)))
    }
}

/// Per-session key entry, the counterpart of a password field in the UI.
/// An empty key switches the model off for this session.
async fn set_credential(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<CredentialRequest>,
) -> AppResult<Json<StatusResponse>> {
    let session = state.sessions.get(&session_id).await?;
    let llm = if request.api_key.trim().is_empty() {
        None
    } else {
        Some(state.llm_for_key(&request.api_key)?)
    };

    let mut session = session.lock().await;
    session.set_llm(llm);
    Ok(Json(StatusResponse {
        status: "success".to_string(),
        llm_configured: session.llm_configured(),
    }))
}
