//! Document models.
//!
//! Field names serialize in camelCase so the JSON shape matches the
//! documents the web client already reads (`isOutgoing`, `unreadCount`,
//! `lastMessageUserTimestamp`, ...).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_AVATAR, STATUS_TTL_HOURS};
use crate::time::{RawTimestamp, TimeFormatter};

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// One customer conversation. The id is the canonical phone number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Chat {
    pub id: String,
    /// Name given by the admin when saving the contact. Empty until then.
    pub name: String,
    pub phone_number: String,
    /// Last message in either direction.
    pub last_message: String,
    /// Time of the last activity in either direction.
    pub timestamp: Option<DateTime<Utc>>,
    pub avatar: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub user_avatar: Option<String>,
    pub about: Option<String>,
    pub online: bool,
    /// Category ids applied to this chat.
    pub categories: Vec<String>,
    pub unread_count: u32,
    pub is_agendado: bool,
    pub is_blocked: bool,
    pub blocked_at: Option<DateTime<Utc>>,
    pub last_message_user: Option<String>,
    pub last_message_user_timestamp: Option<DateTime<Utc>>,
    pub last_message_admin: Option<String>,
    pub last_message_admin_timestamp: Option<DateTime<Utc>>,
    pub last_read_by_admin: Option<DateTime<Utc>>,
    pub last_read_message_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Chat {
    /// A fresh, unsaved chat for a phone number.
    pub fn new(phone: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: phone.to_string(),
            phone_number: phone.to_string(),
            timestamp: Some(now),
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        }
    }

    /// The saved contact name, or the phone number for unknown contacts.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.phone_number
        } else {
            &self.name
        }
    }

    /// First populated avatar field, falling back to the default image.
    pub fn avatar_url(&self) -> &str {
        [&self.avatar, &self.photo_url, &self.user_avatar]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|url| !url.is_empty())
            .unwrap_or(DEFAULT_AVATAR)
    }

    /// Sort key for the chat list: the user's last message, falling back
    /// to the chat's own timestamp. `0` when neither is set.
    pub fn activity_millis(&self) -> i64 {
        self.last_message_user_timestamp
            .or(self.timestamp)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Document,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "document" => Some(Self::Document),
            _ => None,
        }
    }

    /// Only attachments keep a file name.
    pub fn carries_filename(self) -> bool {
        matches!(self, MessageKind::Image | MessageKind::Document)
    }
}

/// Delivery state of a message.
///
/// Transitions only move forward (`sent` → `delivered` → `read`); a
/// message may jump from `sent` straight to `read`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            _ => None,
        }
    }

    /// The status after applying `next`, or `None` if `next` would not move
    /// the message forward.
    pub fn advance(self, next: MessageStatus) -> Option<MessageStatus> {
        (next > self).then_some(next)
    }
}

/// Per-status receipt timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Receipts {
    pub sent: Option<DateTime<Utc>>,
    pub delivered: Option<DateTime<Utc>>,
    pub read: Option<DateTime<Utc>>,
}

impl Receipts {
    pub fn stamp(&mut self, status: MessageStatus, at: DateTime<Utc>) {
        match status {
            MessageStatus::Sent => self.sent = Some(at),
            MessageStatus::Delivered => self.delivered = Some(at),
            MessageStatus::Read => self.read = Some(at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    /// Text, or the file URL for images and documents.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// `true` when sent by the admin.
    pub is_outgoing: bool,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filename: Option<String>,
    pub status: MessageStatus,
    #[serde(default)]
    pub receipts: Receipts,
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A label the admin applies to chats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Number of chats carrying this category.
    #[serde(default)]
    pub count: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Admin profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminProfile {
    pub name: String,
    pub avatar: Option<String>,
    pub about: String,
    pub online: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Admin status
// ---------------------------------------------------------------------------

/// A story-style post from the admin, visible for 24 hours.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    pub id: String,
    pub image_url: String,
    #[serde(default)]
    pub caption: String,
    pub timestamp: DateTime<Utc>,
}

impl AdminStatus {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.timestamp + Duration::hours(STATUS_TTL_HOURS)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Profile the end user edits from the chat screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub phone_number: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub about: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A chat the admin has not saved as a contact yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnknownContact {
    pub id: String,
    pub phone_number: String,
    pub last_message: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&Chat> for UnknownContact {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id.clone(),
            phone_number: chat.phone_number.clone(),
            last_message: chat.last_message.clone(),
            timestamp: chat.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

/// Merge-style update of a chat document. Absent fields are left alone.
///
/// `timestamp` accepts any [`RawTimestamp`] shape so documents imported
/// from older clients keep their ordering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatPatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub user_avatar: Option<String>,
    pub about: Option<String>,
    pub online: Option<bool>,
    pub categories: Option<Vec<String>>,
    pub is_agendado: Option<bool>,
    pub last_message: Option<String>,
    pub timestamp: Option<RawTimestamp>,
}

impl ChatPatch {
    pub fn apply(self, chat: &mut Chat, fmt: &TimeFormatter, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            chat.name = name;
        }
        if let Some(avatar) = self.avatar {
            chat.avatar = Some(avatar);
        }
        if let Some(url) = self.photo_url {
            chat.photo_url = Some(url);
        }
        if let Some(url) = self.user_avatar {
            chat.user_avatar = Some(url);
        }
        if let Some(about) = self.about {
            chat.about = Some(about);
        }
        if let Some(online) = self.online {
            chat.online = online;
        }
        if let Some(categories) = self.categories {
            chat.categories = categories;
        }
        if let Some(agendado) = self.is_agendado {
            chat.is_agendado = agendado;
        }
        if let Some(text) = self.last_message {
            chat.last_message = text;
        }
        if let Some(raw) = self.timestamp {
            chat.timestamp = fmt.to_datetime(&raw, now);
        }
        chat.updated_at = Some(now);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AdminProfilePatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub about: Option<String>,
    pub online: Option<bool>,
}

impl AdminProfilePatch {
    pub fn apply(self, profile: &mut AdminProfile, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            profile.name = name;
        }
        if let Some(avatar) = self.avatar {
            profile.avatar = Some(avatar);
        }
        if let Some(about) = self.about {
            profile.about = about;
        }
        if let Some(online) = self.online {
            profile.online = online;
        }
        profile.updated_at = Some(now);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusPatch {
    pub image_url: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct UserProfilePatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub about: Option<String>,
}

impl UserProfilePatch {
    pub fn apply(self, profile: &mut UserProfile, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            profile.name = Some(name);
        }
        if let Some(avatar) = self.avatar {
            profile.avatar = Some(avatar);
        }
        if let Some(about) = self.about {
            profile.about = Some(about);
        }
        profile.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_only_moves_forward() {
        use MessageStatus::*;
        assert_eq!(Sent.advance(Delivered), Some(Delivered));
        assert_eq!(Sent.advance(Read), Some(Read));
        assert_eq!(Delivered.advance(Read), Some(Read));
        assert_eq!(Read.advance(Delivered), None);
        assert_eq!(Delivered.advance(Delivered), None);
        assert_eq!(Read.advance(Sent), None);
    }

    #[test]
    fn avatar_fallback_chain() {
        let mut chat = Chat::new("5491123456789", Utc::now());
        assert_eq!(chat.avatar_url(), DEFAULT_AVATAR);

        chat.user_avatar = Some("u.png".into());
        assert_eq!(chat.avatar_url(), "u.png");

        chat.photo_url = Some("p.png".into());
        assert_eq!(chat.avatar_url(), "p.png");

        chat.avatar = Some(String::new());
        assert_eq!(chat.avatar_url(), "p.png");

        chat.avatar = Some("a.png".into());
        assert_eq!(chat.avatar_url(), "a.png");
    }

    #[test]
    fn display_name_falls_back_to_phone() {
        let mut chat = Chat::new("5491123456789", Utc::now());
        assert_eq!(chat.display_name(), "5491123456789");
        chat.name = "Lucía".into();
        assert_eq!(chat.display_name(), "Lucía");
    }

    #[test]
    fn chat_json_uses_document_field_names() {
        let chat = Chat {
            photo_url: Some("x".into()),
            ..Chat::new("5491100000000", Utc::now())
        };
        let json = serde_json::to_value(&chat).unwrap();
        assert!(json.get("photoURL").is_some());
        assert!(json.get("unreadCount").is_some());
        assert!(json.get("isAgendado").is_some());
        assert!(json.get("lastMessageUserTimestamp").is_some());
    }

    #[test]
    fn message_type_field() {
        let msg = Message {
            id: "m1".into(),
            chat_id: "c".into(),
            content: "hola".into(),
            timestamp: Utc::now(),
            is_outgoing: false,
            kind: MessageKind::Image,
            filename: None,
            status: MessageStatus::Sent,
            receipts: Receipts::default(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["status"], "sent");
        assert!(json.get("filename").is_none());
    }

    #[test]
    fn chat_patch_merges_and_normalizes_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap();
        let mut chat = Chat::new("5491100000000", now);
        chat.about = Some("keep".into());

        let patch: ChatPatch = serde_json::from_str(
            r#"{"name": "Ana", "timestamp": "08:30", "categories": ["vip"]}"#,
        )
        .unwrap();
        patch.apply(&mut chat, &TimeFormatter::utc(), now);

        assert_eq!(chat.name, "Ana");
        assert_eq!(chat.about.as_deref(), Some("keep"));
        assert_eq!(chat.categories, vec!["vip".to_string()]);
        assert_eq!(
            chat.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn status_expires_after_a_day() {
        let posted = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let status = AdminStatus {
            id: "s".into(),
            image_url: "img".into(),
            caption: String::new(),
            timestamp: posted,
        };
        assert!(status.is_active(posted + Duration::hours(23)));
        assert!(!status.is_active(posted + Duration::hours(24)));
    }
}
