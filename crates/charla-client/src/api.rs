//! HTTP client for the Charla server.

use bytes::Bytes;
use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use charla_shared::constants::SESSION_KEY;
use charla_shared::filter::{ChatFilter, ChatTab};
use charla_shared::models::{
    AdminProfile, AdminProfilePatch, AdminStatus, Category, CategoryPatch, Chat, ChatPatch,
    Message, MessageKind, StatusPatch, UnknownContact, UserProfile, UserProfilePatch,
};
use charla_shared::PhoneNumber;

use crate::error::{ClientError, Result};

/// Who requests are made as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    Anonymous,
    /// End user, sent as the session cookie.
    User(PhoneNumber),
    /// Admin bearer token from `/admin/login`.
    Admin(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub admin_enabled: bool,
    pub verification_enabled: bool,
    pub utc_offset_minutes: i32,
    pub max_file_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeResponse {
    pub success: bool,
    pub sid: String,
    pub verification_code: u32,
    pub formatted_number: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub phone_number: Option<String>,
    pub chat: Option<Chat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: MessageKind::Text,
            filename: None,
        }
    }

    /// An image or document whose `content` is the uploaded file's URL.
    pub fn attachment(kind: MessageKind, url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            content: url.into(),
            kind,
            filename: Some(filename.into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub url: String,
    pub folder: String,
    pub name: String,
    pub size: usize,
    pub content_type: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: Credentials::Anonymous,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Absolute URL for a server path; absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        }
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.credentials {
            Credentials::Anonymous => builder,
            Credentials::User(phone) => {
                builder.header(header::COOKIE, format!("{SESSION_KEY}={}", phone.digits()))
            }
            Credentials::Admin(token) => builder.bearer_auth(token),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let resp = check(builder.send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<()> {
        check(builder.send().await?).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Service
    // -----------------------------------------------------------------------

    pub async fn health(&self) -> Result<Health> {
        self.fetch(self.request(Method::GET, "/health")).await
    }

    pub async fn server_info(&self) -> Result<ServerInfo> {
        self.fetch(self.request(Method::GET, "/info")).await
    }

    // -----------------------------------------------------------------------
    // Verification and sessions
    // -----------------------------------------------------------------------

    /// `POST /api/sendWhatsApp`
    pub async fn send_whatsapp(&self, phone_number: &str) -> Result<SendCodeResponse> {
        let sent: SendCodeResponse = self
            .fetch(
                self.request(Method::POST, "/api/sendWhatsApp")
                    .json(&json!({ "phoneNumber": phone_number })),
            )
            .await?;
        debug!(phone = %sent.formatted_number, sid = %sent.sid, "Verification code sent");
        Ok(sent)
    }

    /// Check `code` server-side and adopt the resulting user session.
    pub async fn verify(&mut self, phone: &PhoneNumber, code: &str) -> Result<SessionInfo> {
        let session: SessionInfo = self
            .fetch(
                self.request(Method::POST, "/api/verify")
                    .json(&json!({ "phoneNumber": phone.digits(), "code": code })),
            )
            .await?;
        self.credentials = Credentials::User(phone.clone());
        Ok(session)
    }

    /// Landing form without verification.
    pub async fn start_session(&mut self, phone_number: &str) -> Result<SessionInfo> {
        let phone = PhoneNumber::parse(phone_number)?;
        let session: SessionInfo = self
            .fetch(
                self.request(Method::POST, "/api/session")
                    .json(&json!({ "phoneNumber": phone.digits() })),
            )
            .await?;
        self.credentials = Credentials::User(phone);
        Ok(session)
    }

    pub async fn current_session(&self) -> Result<SessionInfo> {
        self.fetch(self.request(Method::GET, "/api/session")).await
    }

    pub async fn end_session(&mut self) -> Result<()> {
        self.execute(self.request(Method::DELETE, "/api/session"))
            .await?;
        self.credentials = Credentials::Anonymous;
        Ok(())
    }

    pub async fn admin_login(&mut self, email: &str, password: &str) -> Result<()> {
        let body: TokenBody = self
            .fetch(
                self.request(Method::POST, "/admin/login")
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        self.credentials = Credentials::Admin(body.token);
        info!("Signed in as admin");
        Ok(())
    }

    pub async fn admin_logout(&mut self) -> Result<()> {
        self.execute(self.request(Method::POST, "/admin/logout"))
            .await?;
        self.credentials = Credentials::Anonymous;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Chats
    // -----------------------------------------------------------------------

    pub async fn list_chats(&self, filter: &ChatFilter) -> Result<Vec<Chat>> {
        let tab = match filter.tab {
            ChatTab::Chats => "chats",
            ChatTab::Contacts => "contacts",
        };
        let categories = filter
            .categories
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.fetch(self.request(Method::GET, "/api/chats").query(&[
            ("search", filter.search.as_str()),
            ("tab", tab),
            ("categories", categories.as_str()),
        ]))
        .await
    }

    pub async fn unknown_contacts(&self) -> Result<Vec<UnknownContact>> {
        self.fetch(self.request(Method::GET, "/api/contacts/unknown"))
            .await
    }

    pub async fn get_chat(&self, id: &str) -> Result<Chat> {
        self.fetch(self.request(Method::GET, &format!("/api/chats/{id}")))
            .await
    }

    pub async fn upsert_chat(&self, id: &str, patch: &ChatPatch) -> Result<Chat> {
        self.fetch(
            self.request(Method::PUT, &format!("/api/chats/{id}"))
                .json(patch),
        )
        .await
    }

    pub async fn edit_contact(&self, id: &str, name: &str, categories: &[String]) -> Result<Chat> {
        self.fetch(
            self.request(Method::PUT, &format!("/api/chats/{id}/contact"))
                .json(&json!({ "name": name, "categories": categories })),
        )
        .await
    }

    pub async fn block_contact(&self, id: &str) -> Result<Chat> {
        self.fetch(self.request(Method::POST, &format!("/api/chats/{id}/block")))
            .await
    }

    pub async fn unblock_contact(&self, id: &str) -> Result<Chat> {
        self.fetch(self.request(Method::POST, &format!("/api/chats/{id}/unblock")))
            .await
    }

    /// Zero the unread counter and mark every incoming message read.
    pub async fn mark_chat_read(&self, id: &str) -> Result<Chat> {
        self.fetch(self.request(Method::POST, &format!("/api/chats/{id}/read")))
            .await
    }

    pub async fn mark_read_up_to(&self, id: &str, last_message_id: &str) -> Result<Chat> {
        self.fetch(
            self.request(Method::POST, &format!("/api/chats/{id}/read-up-to"))
                .json(&json!({ "lastMessageId": last_message_id })),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    pub async fn messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        self.fetch(self.request(Method::GET, &format!("/api/chats/{chat_id}/messages")))
            .await
    }

    pub async fn send_message(&self, chat_id: &str, message: &OutgoingMessage) -> Result<Message> {
        self.fetch(
            self.request(Method::POST, &format!("/api/chats/{chat_id}/messages"))
                .json(message),
        )
        .await
    }

    pub async fn mark_delivered(&self, chat_id: &str, message_id: &str) -> Result<Message> {
        self.fetch(self.request(
            Method::POST,
            &format!("/api/chats/{chat_id}/messages/{message_id}/delivered"),
        ))
        .await
    }

    pub async fn mark_read(&self, chat_id: &str, message_id: &str) -> Result<Message> {
        self.fetch(self.request(
            Method::POST,
            &format!("/api/chats/{chat_id}/messages/{message_id}/read"),
        ))
        .await
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.fetch(self.request(Method::GET, "/api/categories"))
            .await
    }

    pub async fn add_category(&self, name: &str, color: &str) -> Result<Category> {
        self.fetch(
            self.request(Method::POST, "/api/categories")
                .json(&json!({ "name": name, "color": color })),
        )
        .await
    }

    pub async fn update_category(&self, id: &str, patch: &CategoryPatch) -> Result<Category> {
        self.fetch(
            self.request(Method::PATCH, &format!("/api/categories/{id}"))
                .json(patch),
        )
        .await
    }

    pub async fn delete_category(&self, id: &str) -> Result<()> {
        self.execute(self.request(Method::DELETE, &format!("/api/categories/{id}")))
            .await
    }

    // -----------------------------------------------------------------------
    // Admin profile and statuses
    // -----------------------------------------------------------------------

    pub async fn admin_profile(&self) -> Result<Option<AdminProfile>> {
        self.fetch(self.request(Method::GET, "/api/admin/profile"))
            .await
    }

    pub async fn update_admin_profile(&self, patch: &AdminProfilePatch) -> Result<AdminProfile> {
        self.fetch(self.request(Method::PUT, "/api/admin/profile").json(patch))
            .await
    }

    /// Statuses posted in the last 24 hours.
    pub async fn statuses(&self) -> Result<Vec<AdminStatus>> {
        self.fetch(self.request(Method::GET, "/api/statuses"))
            .await
    }

    pub async fn add_status(&self, image_url: &str, caption: &str) -> Result<AdminStatus> {
        self.fetch(
            self.request(Method::POST, "/api/statuses")
                .json(&json!({ "imageUrl": image_url, "caption": caption })),
        )
        .await
    }

    pub async fn update_status(&self, id: &str, patch: &StatusPatch) -> Result<AdminStatus> {
        self.fetch(
            self.request(Method::PATCH, &format!("/api/statuses/{id}"))
                .json(patch),
        )
        .await
    }

    pub async fn delete_status(&self, id: &str) -> Result<()> {
        self.execute(self.request(Method::DELETE, &format!("/api/statuses/{id}")))
            .await
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub async fn user_profile(&self, phone: &PhoneNumber) -> Result<UserProfile> {
        self.fetch(self.request(Method::GET, &format!("/api/users/{}", phone.digits())))
            .await
    }

    pub async fn update_user_profile(
        &self,
        phone: &PhoneNumber,
        patch: &UserProfilePatch,
    ) -> Result<UserProfile> {
        self.fetch(
            self.request(Method::PUT, &format!("/api/users/{}", phone.digits()))
                .json(patch),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    pub async fn upload_file(
        &self,
        folder: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<UploadedFile> {
        let size = data.len();
        let part = reqwest::multipart::Part::bytes(data).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("folder", folder.to_string())
            .part("file", part);

        let uploaded: UploadedFile = self
            .fetch(self.request(Method::POST, "/api/files").multipart(form))
            .await?;
        info!(url = %uploaded.url, size, "File uploaded");
        Ok(uploaded)
    }

    /// Download a file by the URL returned from [`upload_file`](Self::upload_file).
    pub async fn download_file(&self, url: &str) -> Result<Bytes> {
        let resp = check(self.request(Method::GET, url).send().await?).await?;
        Ok(resp.bytes().await?)
    }

    pub async fn delete_file(&self, folder: &str, name: &str) -> Result<()> {
        self.execute(self.request(Method::DELETE, &format!("/api/files/{folder}/{name}")))
            .await
    }
}

/// Turn a non-success response into [`ClientError::Api`].
pub(crate) async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
