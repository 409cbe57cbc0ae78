//! Messaging handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::models::{ConversationSummary, Message, NewMessage};
use uuid::Uuid;

use super::storage_error;
use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::MarkReadResponse,
    state::AppState,
};

pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<NewMessage>,
) -> ApiResult<impl IntoResponse> {
    if payload.sender_id != auth.id {
        return Err(ApiError::Unauthorized(
            "You can only send messages as yourself".to_string(),
        ));
    }
    payload.validate()?;

    let recipient_exists = state
        .users
        .exists(payload.recipient_id)
        .await
        .map_err(storage_error("Failed to look up recipient"))?;
    if !recipient_exists {
        return Err(ApiError::NotFound("Recipient not found".to_string()));
    }

    let message = state
        .messages
        .create(&payload)
        .await
        .map_err(storage_error("Failed to send message"))?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Everything the user sent or received, oldest first
pub async fn user_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Message>>> {
    auth.ensure_self(user_id)?;

    let messages = state
        .messages
        .for_user(user_id)
        .await
        .map_err(storage_error("Failed to load messages"))?;

    Ok(Json(messages))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((user_id, other_user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<MarkReadResponse>> {
    auth.ensure_self(user_id)?;

    let updated = state
        .messages
        .mark_read(user_id, other_user_id)
        .await
        .map_err(storage_error("Failed to mark messages read"))?;

    Ok(Json(MarkReadResponse {
        message: "Messages marked as read".to_string(),
        updated,
    }))
}

pub async fn conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    auth.ensure_self(user_id)?;

    let conversations = state
        .messages
        .conversations(user_id)
        .await
        .map_err(storage_error("Failed to load conversations"))?;

    Ok(Json(conversations))
}
