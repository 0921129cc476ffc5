use serde::{Deserialize, Serialize};

use crate::models::{AdminProfile, AdminStatus, Category, Chat, Message};

/// A realtime snapshot pushed to subscribers after every write.
///
/// Each event carries the *full* current contents of its slice, so a
/// subscriber that missed notifications only has to apply the next one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ChangeEvent {
    Chats(Vec<Chat>),
    #[serde(rename_all = "camelCase")]
    Messages {
        chat_id: String,
        messages: Vec<Message>,
    },
    Statuses(Vec<AdminStatus>),
    Categories(Vec<Category>),
    AdminProfile(Option<AdminProfile>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    Chats,
    Messages,
    Statuses,
    Categories,
    AdminProfile,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Chats,
        Topic::Messages,
        Topic::Statuses,
        Topic::Categories,
        Topic::AdminProfile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Chats => "chats",
            Topic::Messages => "messages",
            Topic::Statuses => "statuses",
            Topic::Categories => "categories",
            Topic::AdminProfile => "adminProfile",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl ChangeEvent {
    pub fn topic(&self) -> Topic {
        match self {
            ChangeEvent::Chats(_) => Topic::Chats,
            ChangeEvent::Messages { .. } => Topic::Messages,
            ChangeEvent::Statuses(_) => Topic::Statuses,
            ChangeEvent::Categories(_) => Topic::Categories,
            ChangeEvent::AdminProfile(_) => Topic::AdminProfile,
        }
    }

    /// The chat a `Messages` event belongs to.
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            ChangeEvent::Messages { chat_id, .. } => Some(chat_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_json_shape() {
        let event = ChangeEvent::Messages {
            chat_id: "5491100000000".into(),
            messages: vec![],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "messages");
        assert_eq!(json["data"]["chatId"], "5491100000000");
        assert_eq!(event.chat_id(), Some("5491100000000"));

        let profile = ChangeEvent::AdminProfile(None);
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["type"], "adminProfile");
        assert_eq!(profile.topic(), Topic::AdminProfile);
    }

    #[test]
    fn topic_names_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(Topic::parse(topic.as_str()), Some(topic));
        }
        assert_eq!(Topic::parse("users"), None);
    }
}
