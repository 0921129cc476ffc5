//! Phone verification, the user session cookie, and admin login.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use charla_shared::models::Chat;
use charla_shared::{PhoneError, PhoneNumber};

use super::AppState;
use crate::auth::{bearer_token, clear_session_cookie, session_cookie, session_phone};
use crate::error::ServerError;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct PhoneRequest {
    phone_number: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SendWhatsAppResponse {
    success: bool,
    sid: String,
    verification_code: u32,
    formatted_number: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VerifyRequest {
    phone_number: String,
    code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SessionResponse {
    phone_number: Option<String>,
    chat: Option<Chat>,
}

#[derive(Deserialize)]
pub(super) struct AdminLoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub(super) struct AdminLoginResponse {
    token: String,
}

fn parse_phone(raw: Option<&str>) -> Result<PhoneNumber, ServerError> {
    Ok(PhoneNumber::parse(raw.unwrap_or_default())?)
}

/// Create the chat for `phone` if needed and greet it once.
fn open_chat(state: &AppState, phone: &PhoneNumber) -> Result<Chat, ServerError> {
    let now = state.now();
    let (chat, created, welcomed) = state.with_db(|db| {
        let (_, created) = db.ensure_chat(phone.digits(), now)?;
        let welcomed = db.send_initial_message(phone.digits(), now)?.is_some();
        Ok((db.fetch_chat(phone.digits())?, created, welcomed))
    })?;

    if created {
        info!(chat = %phone, "New chat opened");
    }
    if created || welcomed {
        state.publish_chats()?;
    }
    if welcomed {
        state.publish_messages(phone.digits())?;
    }
    Ok(chat)
}

/// `POST /api/sendWhatsApp`
pub(super) async fn send_whatsapp(
    State(state): State<AppState>,
    body: Result<Json<PhoneRequest>, JsonRejection>,
) -> Result<Json<SendWhatsAppResponse>, ServerError> {
    // An unreadable body is treated like a missing number.
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let phone = parse_phone(req.phone_number.as_deref())?;

    let sent = state.verifier.send_code(&phone, state.now()).await?;

    Ok(Json(SendWhatsAppResponse {
        success: true,
        sid: sent.sid,
        verification_code: sent.code,
        formatted_number: phone.digits().to_string(),
    }))
}

/// `POST /api/verify`: check the code, open the chat and set the cookie.
pub(super) async fn verify_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let phone = parse_phone(Some(&req.phone_number))?;
    if !state.verifier.verify(&phone, &req.code, state.now()).await {
        return Err(ServerError::InvalidCode);
    }

    let chat = open_chat(&state, &phone)?;
    info!(phone = %phone, "Phone verified");

    Ok((
        [(header::SET_COOKIE, session_cookie(&phone))],
        Json(SessionResponse {
            phone_number: Some(phone.digits().to_string()),
            chat: Some(chat),
        }),
    ))
}

/// `POST /api/session`: landing form without verification.
pub(super) async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<PhoneRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let phone = match req.phone_number.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => PhoneNumber::parse(raw)?,
        _ => return Err(PhoneError::Missing.into()),
    };
    let chat = open_chat(&state, &phone)?;

    Ok((
        [(header::SET_COOKIE, session_cookie(&phone))],
        Json(SessionResponse {
            phone_number: Some(phone.digits().to_string()),
            chat: Some(chat),
        }),
    ))
}

/// `GET /api/session`
pub(super) async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ServerError> {
    let Some(phone) = session_phone(&headers) else {
        return Ok(Json(SessionResponse {
            phone_number: None,
            chat: None,
        }));
    };

    let chat = match state.with_db(|db| db.fetch_chat(phone.digits())) {
        Ok(chat) => Some(chat),
        Err(ServerError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };
    Ok(Json(SessionResponse {
        phone_number: Some(phone.digits().to_string()),
        chat,
    }))
}

/// `DELETE /api/session`
pub(super) async fn end_session() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({ "success": true })),
    )
}

/// `POST /admin/login`
pub(super) async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<AdminLoginResponse>, ServerError> {
    let token = state
        .admin_sessions
        .login(&state.config, &req.email, &req.password, state.now())
        .await?;
    Ok(Json(AdminLoginResponse { token }))
}

/// `POST /admin/logout`
pub(super) async fn admin_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ServerError> {
    let token = bearer_token(&headers).ok_or(ServerError::Unauthorized)?;
    let revoked = state.admin_sessions.logout(token).await;
    Ok(Json(serde_json::json!({ "loggedOut": revoked })))
}
