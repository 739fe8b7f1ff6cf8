use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{AppState, PlotQuery};
use crate::plot::{render_svg, ChartSpec};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{session_id}/plot", get(plot_data))
        .route("/api/sessions/{session_id}/plot.svg", get(plot_svg))
        .with_state(state)
}

async fn build_spec(state: &AppState, session_id: Uuid, query: &PlotQuery) -> AppResult<ChartSpec> {
    let kind = query.kind()?;
    let session = state.sessions.get(&session_id).await?;
    let spec = session.lock().await.render_auto_plot(&query.column, kind)?;
    info!(%session_id, column = %query.column, kind = %kind, points = spec.points.len(), "Chart built");
    Ok(spec)
}

async fn plot_data(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<PlotQuery>,
) -> AppResult<Json<ChartSpec>> {
    Ok(Json(build_spec(&state, session_id, &query).await?))
}

async fn plot_svg(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<PlotQuery>,
) -> AppResult<impl IntoResponse> {
    let spec = build_spec(&state, session_id, &query).await?;
    let svg = render_svg(&spec).map_err(|e| {
        error!(%session_id, error = %e, "Unable to draw chart");
        AppError::Internal(format!("Unable to plot chart: {}", e))
    })?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}
