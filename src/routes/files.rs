use axum::{
    extract::{Multipart, Path, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::models::{AppState, UploadResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{session_id}/dataset", post(upload_dataset))
        .route("/api/sessions/{session_id}/dictionary", post(upload_dictionary))
        .with_state(state)
}

async fn upload_dataset(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let session = state.sessions.get(&session_id).await?;
    let (filename, data) = read_csv_field(multipart).await?;
    info!(%session_id, filename = ?filename, size = data.len(), "Dataset upload received");

    let preview = session.lock().await.load_primary_dataset(&data)?;
    Ok(Json(UploadResponse {
        status: "success".to_string(),
        filename,
        preview,
    }))
}

async fn upload_dictionary(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let session = state.sessions.get(&session_id).await?;
    let (filename, data) = read_csv_field(multipart).await?;
    info!(%session_id, filename = ?filename, size = data.len(), "Data dictionary upload received");

    let preview = session.lock().await.load_data_dictionary(&data)?;
    Ok(Json(UploadResponse {
        status: "success".to_string(),
        filename,
        preview,
    }))
}

/// Take the `file` field, or the first field carrying a file name.
async fn read_csv_field(mut multipart: Multipart) -> AppResult<(Option<String>, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let filename = field.file_name().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read uploaded file: {}", e)))?;
        return Ok((filename, data));
    }
    Err(AppError::InvalidInput(
        "Upload must contain a 'file' field".to_string(),
    ))
}
