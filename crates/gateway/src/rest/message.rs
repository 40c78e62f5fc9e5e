//! Message REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;

use sendiz_chats::{MessageDraft, MessagePage, PageCursor};
use sendiz_database::{Message, NewAttachment};

use crate::error::GatewayResult;
use crate::middleware::UserId;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reply_to: Option<i64>,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMessagesQuery {
    /// Id of the oldest message already seen; omitted or 0 starts at the newest.
    pub cursor: Option<i64>,
    pub limit: Option<u32>,
}

pub fn create_message_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route(
            "/chats/:chat_id/messages",
            get(list_messages).post(create_message),
        )
        .route(
            "/chats/:chat_id/messages/:message_id",
            put(update_message).delete(delete_message),
        )
}

pub async fn list_messages(
    Path(chat_id): Path<i64>,
    Query(params): Query<ListMessagesQuery>,
    State(state): State<Arc<GatewayState>>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> GatewayResult<Json<MessagePage>> {
    let cursor = PageCursor::from(params.cursor.unwrap_or(0));

    let page = state
        .engine
        .fetch_history(chat_id, user_id, cursor, params.limit.unwrap_or(0))
        .await?;

    Ok(Json(page))
}

pub async fn create_message(
    Path(chat_id): Path<i64>,
    State(state): State<Arc<GatewayState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(body): Json<CreateMessageRequest>,
) -> GatewayResult<(StatusCode, Json<Message>)> {
    let draft = MessageDraft {
        text: body.text,
        reply_to: body.reply_to,
        attachments: body.attachments,
    };

    let message = state.engine.submit(chat_id, user_id, draft).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn update_message(
    Path((chat_id, message_id)): Path<(i64, i64)>,
    State(state): State<Arc<GatewayState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(body): Json<UpdateMessageRequest>,
) -> GatewayResult<Json<Message>> {
    let message = state
        .engine
        .edit_message(chat_id, user_id, message_id, body.text)
        .await?;
    Ok(Json(message))
}

pub async fn delete_message(
    Path((chat_id, message_id)): Path<(i64, i64)>,
    State(state): State<Arc<GatewayState>>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> GatewayResult<StatusCode> {
    state
        .engine
        .delete_message(chat_id, user_id, message_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
