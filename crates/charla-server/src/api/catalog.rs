//! Categories, the admin profile, admin statuses and user profiles.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use charla_shared::models::{
    AdminProfile, AdminProfilePatch, AdminStatus, Category, CategoryPatch, StatusPatch,
    UserProfile, UserProfilePatch,
};
use charla_shared::PhoneNumber;

use super::AppState;
use crate::error::ServerError;

#[derive(Deserialize)]
pub(super) struct NewCategory {
    name: String,
    #[serde(default = "default_color")]
    color: String,
}

fn default_color() -> String {
    "#25d366".to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NewStatus {
    image_url: String,
    #[serde(default)]
    caption: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub(super) struct StatusQuery {
    /// Include expired statuses (admin only).
    all: bool,
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

pub(super) async fn list_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Category>>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    Ok(Json(state.with_db(|db| db.fetch_categories())?))
}

pub(super) async fn add_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), ServerError> {
    state.caller(&headers).await.require_admin()?;
    let now = state.now();
    let category = state.with_db(|db| db.add_category(&req.name, &req.color, now))?;
    info!(id = %category.id, name = %category.name, "Category added");
    state.publish_categories()?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub(super) async fn update_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<CategoryPatch>,
) -> Result<Json<Category>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let now = state.now();
    let category = state.with_db(|db| db.update_category(&id, patch, now))?;
    state.publish_categories()?;
    Ok(Json(category))
}

pub(super) async fn delete_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let now = state.now();
    if !state.with_db(|db| db.delete_category(&id, now))? {
        return Err(ServerError::NotFound(format!("Category not found: {id}")));
    }
    info!(%id, "Category deleted");
    state.publish_categories()?;
    state.publish_chats()?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Admin profile
// ---------------------------------------------------------------------------

/// Public: users see the admin's name and picture.
pub(super) async fn get_admin_profile(
    State(state): State<AppState>,
) -> Result<Json<Option<AdminProfile>>, ServerError> {
    Ok(Json(state.with_db(|db| db.fetch_admin_profile())?))
}

pub(super) async fn update_admin_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<AdminProfilePatch>,
) -> Result<Json<AdminProfile>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let now = state.now();
    let profile = state.with_db(|db| db.update_admin_profile(patch, now))?;
    state.publish_admin_profile()?;
    Ok(Json(profile))
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Active statuses for everyone; `?all=true` adds expired ones for the admin.
pub(super) async fn list_statuses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<AdminStatus>>, ServerError> {
    let now = state.now();
    let statuses = if query.all {
        state.caller(&headers).await.require_admin()?;
        state.with_db(|db| db.fetch_admin_statuses())?
    } else {
        state.with_db(|db| db.fetch_active_statuses(now))?
    };
    Ok(Json(statuses))
}

pub(super) async fn add_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewStatus>,
) -> Result<(StatusCode, Json<AdminStatus>), ServerError> {
    state.caller(&headers).await.require_admin()?;
    let now = state.now();
    let status = state.with_db(|db| db.add_admin_status(&req.image_url, &req.caption, now))?;
    info!(id = %status.id, "Status posted");
    state.publish_statuses()?;
    Ok((StatusCode::CREATED, Json(status)))
}

pub(super) async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<StatusPatch>,
) -> Result<Json<AdminStatus>, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let now = state.now();
    let status = state.with_db(|db| db.update_admin_status(&id, patch, now))?;
    state.publish_statuses()?;
    Ok(Json(status))
}

/// Delete a status and, when it is ours, its image file.
pub(super) async fn delete_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.caller(&headers).await.require_admin()?;
    let status = state
        .with_db(|db| db.delete_admin_status(&id))?
        .ok_or_else(|| ServerError::NotFound(format!("Status not found: {id}")))?;

    if let Err(e) = state.blob_store.delete_by_url(&status.image_url).await {
        warn!(%id, error = %e, "Could not delete status image");
    }
    info!(%id, "Status deleted");
    state.publish_statuses()?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub(super) async fn get_user_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(phone): Path<String>,
) -> Result<Json<UserProfile>, ServerError> {
    let phone = PhoneNumber::parse(&phone)?;
    state.caller(&headers).await.require_chat(phone.digits())?;
    let profile = state
        .with_db(|db| db.fetch_user_profile(phone.digits()))?
        .ok_or_else(|| ServerError::NotFound(format!("User not found: {phone}")))?;
    Ok(Json(profile))
}

pub(super) async fn update_user_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(phone): Path<String>,
    Json(patch): Json<UserProfilePatch>,
) -> Result<Json<UserProfile>, ServerError> {
    let phone = PhoneNumber::parse(&phone)?;
    state.caller(&headers).await.require_chat(phone.digits())?;
    let avatar_changed = patch.avatar.is_some();
    let now = state.now();
    let profile = state.with_db(|db| db.update_user_profile(phone.digits(), patch, now))?;
    if avatar_changed {
        state.publish_chats()?;
    }
    Ok(Json(profile))
}
