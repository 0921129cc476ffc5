//! Chat, contact and message routes.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use tracing::{debug, info};

use charla_shared::filter::{filter_and_sort, ChatFilter, ChatTab};
use charla_shared::models::{Chat, ChatPatch, Message, MessageKind, UnknownContact};
use charla_store::messages::NewMessage;

use super::AppState;
use crate::error::ServerError;

#[derive(Deserialize, Default)]
#[serde(default)]
pub(super) struct ChatListQuery {
    search: String,
    tab: Option<ChatTab>,
    /// Comma-separated category ids.
    categories: String,
}

impl From<ChatListQuery> for ChatFilter {
    fn from(q: ChatListQuery) -> Self {
        ChatFilter {
            search: q.search,
            tab: q.tab.unwrap_or_default(),
            categories: q
                .categories
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect::<BTreeSet<_>>(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct ContactRequest {
    name: String,
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ReadUpToRequest {
    last_message_id: String,
}

#[derive(Deserialize)]
pub(super) struct SendMessageRequest {
    content: String,
    #[serde(rename = "type", default)]
    kind: MessageKind,
    #[serde(default)]
    filename: Option<String>,
}

/// `GET /api/chats?search=&tab=&categories=`
pub(super) async fn list_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ChatListQuery>,
) -> Result<Json<Vec<Chat>>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let chats = state.with_db(|db| db.fetch_chats())?;
    Ok(Json(filter_and_sort(&chats, &query.into())))
}

/// `GET /api/contacts/unknown`
pub(super) async fn unknown_contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UnknownContact>>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    Ok(Json(state.with_db(|db| db.fetch_unknown_contacts())?))
}

/// `GET /api/chats/{id}`
pub(super) async fn get_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Chat>, ServerError> {
    state.caller(&headers).await.require_chat(&id)?;
    Ok(Json(state.with_db(|db| db.fetch_chat(&id))?))
}

/// `PUT /api/chats/{id}`: merge fields, creating the chat if missing.
pub(super) async fn upsert_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<ChatPatch>,
) -> Result<Json<Chat>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let categories_changed = patch.categories.is_some();
    let (fmt, now) = (state.formatter, state.now());
    let chat = state.with_db(|db| db.upsert_chat(&id, patch, &fmt, now))?;

    state.publish_chats()?;
    if categories_changed {
        state.publish_categories()?;
    }
    Ok(Json(chat))
}

/// `PUT /api/chats/{id}/contact`: save the number as a named contact.
pub(super) async fn edit_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ContactRequest>,
) -> Result<Json<Chat>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    if req.name.trim().is_empty() {
        return Err(ServerError::BadRequest("Contact name is required".into()));
    }
    let now = state.now();
    let chat = state.with_db(|db| db.edit_contact(&id, &req.name, &req.categories, now))?;
    info!(chat = %id, "Contact saved");

    state.publish_chats()?;
    state.publish_categories()?;
    Ok(Json(chat))
}

pub(super) async fn block_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Chat>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let now = state.now();
    let chat = state.with_db(|db| db.block_contact(&id, now))?;
    info!(chat = %id, "Contact blocked");
    state.publish_chats()?;
    Ok(Json(chat))
}

pub(super) async fn unblock_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Chat>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let now = state.now();
    let chat = state.with_db(|db| db.unblock_contact(&id, now))?;
    info!(chat = %id, "Contact unblocked");
    state.publish_chats()?;
    Ok(Json(chat))
}

/// `POST /api/chats/{id}/read`: the admin opened the chat.
pub(super) async fn mark_chat_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Chat>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let now = state.now();
    let (chat, flipped) = state.with_db(|db| {
        let flipped = db.reset_unread_count(&id, now)?;
        Ok((db.fetch_chat(&id)?, flipped))
    })?;

    state.publish_chats()?;
    if flipped > 0 {
        state.publish_messages(&id)?;
    }
    Ok(Json(chat))
}

/// `POST /api/chats/{id}/read-up-to`
pub(super) async fn mark_read_up_to(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ReadUpToRequest>,
) -> Result<Json<Chat>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let now = state.now();
    let chat = state.with_db(|db| {
        db.mark_messages_read_up_to(&id, &req.last_message_id, now)?;
        db.fetch_chat(&id)
    })?;

    state.publish_chats()?;
    state.publish_messages(&id)?;
    Ok(Json(chat))
}

/// `GET /api/chats/{id}/messages`
pub(super) async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ServerError> {
    state.caller(&headers).await.require_chat(&id)?;
    let messages = state.with_db(|db| {
        // Distinguish "no messages" from "no such chat".
        db.fetch_chat(&id)?;
        db.fetch_messages(&id)
    })?;
    Ok(Json(messages))
}

/// `POST /api/chats/{id}/messages`: the admin sends outgoing messages,
/// the owning user sends incoming ones.
pub(super) async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ServerError> {
    let caller = state.caller(&headers).await;
    caller.require_chat(&id)?;
    let is_outgoing = caller.is_admin();

    let now = state.now();
    let message = state.with_db(|db| {
        if !is_outgoing && db.fetch_chat(&id)?.is_blocked {
            return Ok(None);
        }
        db.send_message(
            NewMessage {
                chat_id: &id,
                content: &req.content,
                is_outgoing,
                kind: req.kind,
                filename: req.filename.as_deref(),
            },
            now,
        )
        .map(Some)
    })?;

    let Some(message) = message else {
        debug!(chat = %id, "Rejected message from blocked user");
        return Err(ServerError::Forbidden("Chat is blocked".into()));
    };

    state.publish_messages(&id)?;
    state.publish_chats()?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /api/chats/{id}/messages/{mid}/delivered`
pub(super) async fn mark_message_delivered(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, mid)): Path<(String, String)>,
) -> Result<Json<Message>, ServerError> {
    let caller = state.caller(&headers).await;
    caller.require_chat(&id)?;
    let now = state.now();
    let message = state.with_db(|db| db.mark_message_delivered(&id, &mid, now))?;
    state.publish_messages(&id)?;
    Ok(Json(message))
}

/// `POST /api/chats/{id}/messages/{mid}/read`: only the receiving side
/// may mark a message read.
pub(super) async fn mark_message_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, mid)): Path<(String, String)>,
) -> Result<Json<Message>, ServerError> {
    let caller = state.caller(&headers).await;
    caller.require_chat(&id)?;
    let from_admin = caller.is_admin();
    let now = state.now();
    let message = state.with_db(|db| {
        if db.fetch_message(&id, &mid)?.is_outgoing == from_admin {
            return Ok(None);
        }
        db.mark_message_read(&id, &mid, now).map(Some)
    })?;
    let Some(message) = message else {
        debug!(chat = %id, message = %mid, "Rejected read receipt from sender");
        return Err(ServerError::Forbidden(
            "Only the recipient can mark a message read".into(),
        ));
    };
    state.publish_messages(&id)?;
    Ok(Json(message))
}
