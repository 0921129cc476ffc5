//! File upload and download.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use super::AppState;
use crate::auth::Caller;
use crate::blob_store::{content_type_for, DEFAULT_FOLDER, USER_FOLDERS};
use crate::error::ServerError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UploadResponse {
    url: String,
    folder: String,
    name: String,
    size: usize,
    content_type: &'static str,
}

/// `POST /api/files`: multipart with a `file` field and an optional
/// `folder` field. Users may only upload into [`USER_FOLDERS`].
pub(super) async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ServerError> {
    let caller = state.caller(&headers).await;
    if caller == Caller::Anonymous {
        return Err(ServerError::Unauthorized);
    }

    let mut folder = DEFAULT_FOLDER.to_string();
    let mut file: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        match field.name().unwrap_or("") {
            "folder" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
                if !value.trim().is_empty() {
                    folder = value.trim().to_string();
                }
            }
            "file" => {
                let filename = field.file_name().unwrap_or("file").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
                file = Some((filename, data));
            }
            _ => {}
        }
    }

    if !caller.is_admin() && !USER_FOLDERS.contains(&folder.as_str()) {
        warn!(folder = %folder, "User upload into admin folder rejected");
        return Err(ServerError::Forbidden(format!(
            "Uploads to '{folder}' require admin access"
        )));
    }

    let Some((filename, data)) = file else {
        return Err(ServerError::BadRequest(
            "Missing 'file' field in multipart form".to_string(),
        ));
    };

    let stored = state
        .blob_store
        .store_file(&folder, &filename, &data, state.now())
        .await?;
    info!(folder = %stored.folder, name = %stored.name, size = stored.size, "File uploaded via API");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: state.config.file_url(&stored.folder, &stored.name),
            folder: stored.folder,
            name: stored.name,
            size: stored.size,
            content_type: stored.content_type,
        }),
    ))
}

/// `GET /api/files/{folder}/{name}`
pub(super) async fn download(
    State(state): State<AppState>,
    Path((folder, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.blob_store.read_file(&folder, &name).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&name))], data))
}

/// `DELETE /api/files/{folder}/{name}`
pub(super) async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((folder, name)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    state.caller(&headers).await.require_admin()?;
    state.blob_store.delete_file(&folder, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
