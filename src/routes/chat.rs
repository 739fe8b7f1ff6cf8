use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::models::{AppState, ChatRequest, ChatResponse};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{session_id}/chat", post(post_chat))
        .with_state(state)
}

pub async fn post_chat(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    info!(%session_id, message_len = request.message.len(), "Received chat message");

    let session = state.sessions.get(&session_id).await?;
    let mut session = session.lock().await;
    let reply = session.submit_chat_message(&request.message).await?;

    info!(%session_id, source = ?reply.source, "Chat reply sent");
    Ok(Json(ChatResponse {
        reply: reply.content,
        source: reply.source,
        template: reply.template,
        chat_history: session.chat_history().to_vec(),
    }))
}
