//! View models for the chat list and message thread.

use chrono::{DateTime, Utc};
use serde::Serialize;

use charla_shared::models::{Chat, Message, MessageKind, MessageStatus};
use charla_shared::{RawTimestamp, TimeFormatter};

/// Badges above this show as `99+`.
const MAX_BADGE: u32 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRow {
    pub id: String,
    pub title: String,
    pub avatar_url: String,
    pub preview: String,
    pub time: String,
    pub unread_badge: Option<String>,
    pub is_blocked: bool,
}

impl ChatRow {
    pub fn from_chat(chat: &Chat, fmt: &TimeFormatter, now: DateTime<Utc>) -> Self {
        let activity = chat.last_message_user_timestamp.or(chat.timestamp);
        Self {
            id: chat.id.clone(),
            title: chat.display_name().to_string(),
            avatar_url: chat.avatar_url().to_string(),
            preview: chat.last_message.clone(),
            time: fmt.format_time(&RawTimestamp::from(activity), now),
            unread_badge: unread_badge(chat.unread_count),
            is_blocked: chat.is_blocked,
        }
    }
}

pub fn unread_badge(count: u32) -> Option<String> {
    match count {
        0 => None,
        n if n > MAX_BADGE => Some(format!("{MAX_BADGE}+")),
        n => Some(n.to_string()),
    }
}

/// Receipt ticks on the admin's own messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Ticks {
    /// One grey tick.
    Sent,
    /// Two grey ticks.
    Delivered,
    /// Two blue ticks.
    Read,
}

impl From<MessageStatus> for Ticks {
    fn from(status: MessageStatus) -> Self {
        match status {
            MessageStatus::Sent => Ticks::Sent,
            MessageStatus::Delivered => Ticks::Delivered,
            MessageStatus::Read => Ticks::Read,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBubble {
    pub id: String,
    pub kind: MessageKind,
    /// Text, or the attachment URL.
    pub body: String,
    pub filename: Option<String>,
    /// Whether the bubble sits on the viewer's side.
    pub mine: bool,
    pub time: String,
    pub ticks: Option<Ticks>,
}

impl MessageBubble {
    /// `viewer_is_admin` decides which side outgoing messages fall on.
    pub fn from_message(
        message: &Message,
        viewer_is_admin: bool,
        fmt: &TimeFormatter,
        now: DateTime<Utc>,
    ) -> Self {
        let mine = message.is_outgoing == viewer_is_admin;
        Self {
            id: message.id.clone(),
            kind: message.kind,
            body: message.content.clone(),
            filename: message.filename.clone(),
            mine,
            time: fmt.format_time(&RawTimestamp::from(message.timestamp), now),
            ticks: mine.then(|| message.status.into()),
        }
    }
}

/// Bubbles for a whole thread, in order.
pub fn thread(
    messages: &[Message],
    viewer_is_admin: bool,
    fmt: &TimeFormatter,
    now: DateTime<Utc>,
) -> Vec<MessageBubble> {
    messages
        .iter()
        .map(|m| MessageBubble::from_message(m, viewer_is_admin, fmt, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use charla_shared::constants::DEFAULT_AVATAR;
    use charla_shared::models::Receipts;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap()
    }

    #[test]
    fn chat_row_falls_back_to_phone_and_default_avatar() {
        let mut chat = Chat::new("5491123456789", now());
        chat.unread_count = 3;
        chat.last_message = "hola".into();

        let fmt = TimeFormatter::from_offset_minutes(-180).unwrap();
        let row = ChatRow::from_chat(&chat, &fmt, now());
        assert_eq!(row.title, "5491123456789");
        assert_eq!(row.avatar_url, DEFAULT_AVATAR);
        assert_eq!(row.time, "12:00");
        assert_eq!(row.unread_badge.as_deref(), Some("3"));
    }

    #[test]
    fn chat_row_without_timestamp_shows_sentinel() {
        let chat = Chat {
            id: "1".into(),
            ..Default::default()
        };
        let row = ChatRow::from_chat(&chat, &TimeFormatter::utc(), now());
        assert_eq!(row.time, "Sin hora");
        assert_eq!(row.unread_badge, None);
    }

    #[test]
    fn badge_caps_at_99() {
        assert_eq!(unread_badge(100).as_deref(), Some("99+"));
        assert_eq!(unread_badge(99).as_deref(), Some("99"));
    }

    #[test]
    fn ticks_only_on_own_messages() {
        let message = Message {
            id: "m1".into(),
            chat_id: "5491123456789".into(),
            content: "Listo".into(),
            timestamp: now(),
            is_outgoing: true,
            kind: MessageKind::Text,
            filename: None,
            status: MessageStatus::Delivered,
            receipts: Receipts::default(),
        };
        let fmt = TimeFormatter::utc();

        let admin_view = MessageBubble::from_message(&message, true, &fmt, now());
        assert!(admin_view.mine);
        assert_eq!(admin_view.ticks, Some(Ticks::Delivered));

        let user_view = MessageBubble::from_message(&message, false, &fmt, now());
        assert!(!user_view.mine);
        assert_eq!(user_view.ticks, None);
    }
}
