use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{ChatSummary, ChatView, CreateChatRequest, HistoryQuery};
use crate::AppState;

/// GET `/api/chat` — the caller's conversations, most recently active first.
pub async fn list_chats_handler(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatSummary>>, AppError> {
    Ok(Json(state.chat.list_conversations(&user.id).await?))
}

/// GET `/api/chat/{chat_id}?limit=&skip=` — one conversation with a message
/// window taken from the end of the log; `skip` pages backward into history.
/// 403 for non-participants, 404 for unknown conversations.
pub async fn get_chat_handler(
    AuthUser(user): AuthUser,
    Path(chat_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<ChatView>, AppError> {
    let chat = state
        .chat
        .get_conversation(&chat_id, &user.id, query.limit, query.skip)
        .await?;
    Ok(Json(chat))
}

/// POST `/api/chat` — find or create the conversation with `participantId`;
/// 404 if the participant does not exist.
pub async fn create_chat_handler(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateChatRequest>,
) -> Result<Json<ChatView>, AppError> {
    let chat = state.chat.start_conversation(&user.id, &req.participant_id).await?;
    Ok(Json(chat))
}
