use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::models::{AnalysisToggleRequest, AppState, ChartSuggestionsResponse, StatusResponse};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{session_id}/analysis", put(set_analysis))
        .route(
            "/api/sessions/{session_id}/chart-suggestions",
            get(chart_suggestions),
        )
        .with_state(state)
}

async fn set_analysis(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<AnalysisToggleRequest>,
) -> AppResult<Json<StatusResponse>> {
    let session = state.sessions.get(&session_id).await?;
    let mut session = session.lock().await;
    session.set_analysis_enabled(request.enabled);
    info!(%session_id, enabled = request.enabled, "Analysis toggle updated");

    Ok(Json(StatusResponse {
        status: "success".to_string(),
        llm_configured: session.llm_configured(),
    }))
}

async fn chart_suggestions(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ChartSuggestionsResponse>> {
    let session = state.sessions.get(&session_id).await?;
    let suggestions = session.lock().await.chart_suggestions().await?;
    Ok(Json(ChartSuggestionsResponse { suggestions }))
}
