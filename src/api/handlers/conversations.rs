//! Conversation management handlers.

use crate::{
    AppState,
    types::{
        AppError, ConversationResponse, CreateConversationRequest, Message, Result,
    },
};
use axum::{
    Json,
    extract::{Path, State},
};

/// Create a new conversation.
#[utoipa::path(
    post,
    path = "/api/conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 200, description = "Conversation created", body = ConversationResponse)
    ),
    tag = "conversations"
)]
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(payload): Json<CreateConversationRequest>,
) -> Result<Json<ConversationResponse>> {
    let id = state
        .memory
        .create_conversation(payload.title.as_deref())
        .await?;

    let (id, title, created_at) = state
        .memory
        .conversation(&id)
        .await?
        .ok_or_else(|| AppError::Internal("Conversation vanished after create".to_string()))?;

    Ok(Json(ConversationResponse {
        id,
        title,
        created_at,
    }))
}

/// List a conversation's messages in chronological order.
#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Messages", body = [Message]),
        (status = 404, description = "Unknown conversation")
    ),
    tag = "conversations"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>> {
    if !state.memory.conversation_exists(&id).await? {
        return Err(AppError::NotFound(format!("Conversation {}", id)));
    }

    let messages = state.memory.messages(&id).await?;
    Ok(Json(messages))
}
