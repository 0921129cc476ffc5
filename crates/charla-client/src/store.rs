//! Reducer-style application store.
//!
//! All client state lives in one [`AppState`]. It only changes through
//! [`AppState::apply`] (or the free [`reduce`]), fed by UI actions and by
//! realtime snapshots converted with `AppAction::from(ChangeEvent)`.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::debug;

use charla_shared::events::ChangeEvent;
use charla_shared::filter::{filter_and_sort, ChatFilter, ChatTab};
use charla_shared::models::{
    AdminProfile, AdminProfilePatch, AdminStatus, Category, CategoryPatch, Chat, ChatPatch,
    Message, UnknownContact,
};
use charla_shared::TimeFormatter;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub chats: Vec<Chat>,
    pub admin_profile: AdminProfile,
    pub categories: Vec<Category>,
    pub selected_chat_id: Option<String>,
    pub unknown_contacts: Vec<UnknownContact>,
    pub active_tab: ChatTab,
    pub selected_categories: Vec<String>,
    /// Message lists keyed by chat id.
    pub messages: HashMap<String, Vec<Message>>,
    pub statuses: Vec<AdminStatus>,
    /// Resolves raw timestamps carried by chat patches.
    pub formatter: TimeFormatter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    SetSelectedChat(Option<String>),
    UpdateChat { id: String, patch: ChatPatch },
    AddMessage { chat_id: String, message: Message },
    UpdateAdminProfile(AdminProfilePatch),
    /// Full replacement from a realtime snapshot.
    SetAdminProfile(AdminProfile),
    AddCategory(Category),
    UpdateCategory { id: String, patch: CategoryPatch },
    DeleteCategory(String),
    SetActiveTab(ChatTab),
    SetSelectedCategories(Vec<String>),
    ToggleCategoryFilter(String),
    AddUnknownContact(UnknownContact),
    /// Removes by phone number.
    RemoveUnknownContact(String),
    SetChats(Vec<Chat>),
    SetCategories(Vec<Category>),
    SetMessages { chat_id: String, messages: Vec<Message> },
    SetStatuses(Vec<AdminStatus>),
}

impl From<ChangeEvent> for AppAction {
    fn from(event: ChangeEvent) -> Self {
        match event {
            ChangeEvent::Chats(chats) => AppAction::SetChats(chats),
            ChangeEvent::Messages { chat_id, messages } => {
                AppAction::SetMessages { chat_id, messages }
            }
            ChangeEvent::Statuses(statuses) => AppAction::SetStatuses(statuses),
            ChangeEvent::Categories(categories) => AppAction::SetCategories(categories),
            ChangeEvent::AdminProfile(profile) => {
                AppAction::SetAdminProfile(profile.unwrap_or_default())
            }
        }
    }
}

/// Functional form of [`AppState::apply`].
pub fn reduce(mut state: AppState, action: AppAction, now: DateTime<Utc>) -> AppState {
    state.apply(action, now);
    state
}

impl AppState {
    pub fn with_formatter(formatter: TimeFormatter) -> Self {
        Self {
            formatter,
            ..Default::default()
        }
    }

    pub fn apply(&mut self, action: AppAction, now: DateTime<Utc>) {
        match action {
            AppAction::SetSelectedChat(id) => self.selected_chat_id = id,

            AppAction::UpdateChat { id, patch } => {
                let fmt = self.formatter;
                if let Some(chat) = self.chat_mut(&id) {
                    patch.apply(chat, &fmt, now);
                }
            }

            AppAction::AddMessage { chat_id, message } => {
                if let Some(chat) = self.chat_mut(&chat_id) {
                    chat.last_message = message.content.clone();
                    chat.timestamp = Some(message.timestamp);
                }
                self.messages.entry(chat_id).or_default().push(message);
            }

            AppAction::UpdateAdminProfile(patch) => patch.apply(&mut self.admin_profile, now),
            AppAction::SetAdminProfile(profile) => self.admin_profile = profile,

            AppAction::AddCategory(category) => self.categories.push(category),

            AppAction::UpdateCategory { id, patch } => {
                if let Some(category) = self.categories.iter_mut().find(|c| c.id == id) {
                    if let Some(name) = patch.name {
                        category.name = name;
                    }
                    if let Some(color) = patch.color {
                        category.color = color;
                    }
                    category.updated_at = Some(now);
                }
            }

            AppAction::DeleteCategory(id) => {
                self.categories.retain(|c| c.id != id);
                for chat in &mut self.chats {
                    chat.categories.retain(|c| *c != id);
                }
                self.selected_categories.retain(|c| *c != id);
            }

            AppAction::SetActiveTab(tab) => self.active_tab = tab,
            AppAction::SetSelectedCategories(ids) => self.selected_categories = ids,

            AppAction::ToggleCategoryFilter(id) => {
                if let Some(pos) = self.selected_categories.iter().position(|c| *c == id) {
                    self.selected_categories.remove(pos);
                } else {
                    self.selected_categories.push(id);
                }
            }

            AppAction::AddUnknownContact(contact) => self.unknown_contacts.push(contact),
            AppAction::RemoveUnknownContact(phone) => {
                self.unknown_contacts.retain(|c| c.phone_number != phone)
            }

            AppAction::SetChats(chats) => self.chats = chats,
            AppAction::SetCategories(categories) => self.categories = categories,
            AppAction::SetMessages { chat_id, messages } => {
                debug!(chat = %chat_id, count = messages.len(), "Messages snapshot");
                self.messages.insert(chat_id, messages);
            }
            AppAction::SetStatuses(statuses) => self.statuses = statuses,
        }
    }

    fn chat_mut(&mut self, id: &str) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|c| c.id == id)
    }

    pub fn selected_chat(&self) -> Option<&Chat> {
        let id = self.selected_chat_id.as_deref()?;
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn messages_of(&self, chat_id: &str) -> &[Message] {
        self.messages.get(chat_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// The filter the sidebar currently applies.
    pub fn chat_filter(&self, search: &str) -> ChatFilter {
        ChatFilter {
            search: search.to_string(),
            tab: self.active_tab,
            categories: self.selected_categories.iter().cloned().collect::<BTreeSet<_>>(),
        }
    }

    /// Chats to show for `search`, most recent first.
    pub fn visible_chats(&self, search: &str) -> Vec<Chat> {
        filter_and_sort(&self.chats, &self.chat_filter(search))
    }

    pub fn total_unread(&self) -> u32 {
        self.chats.iter().map(|c| c.unread_count).sum()
    }

    pub fn active_statuses(&self, now: DateTime<Utc>) -> impl Iterator<Item = &AdminStatus> + '_ {
        self.statuses.iter().filter(move |s| s.is_active(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charla_shared::models::{MessageKind, MessageStatus, Receipts};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn chat(id: &str, minutes_ago: i64, categories: &[&str]) -> Chat {
        Chat {
            categories: categories.iter().map(|c| c.to_string()).collect(),
            ..Chat::new(id, now() - Duration::minutes(minutes_ago))
        }
    }

    fn category(id: &str) -> Category {
        Category {
            id: id.into(),
            name: id.to_uppercase(),
            color: "#25d366".into(),
            count: 0,
            created_at: None,
            updated_at: None,
        }
    }

    fn message(chat_id: &str, content: &str) -> Message {
        Message {
            id: "m1".into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: now(),
            is_outgoing: false,
            kind: MessageKind::Text,
            filename: None,
            status: MessageStatus::Sent,
            receipts: Receipts::default(),
        }
    }

    fn seeded() -> AppState {
        reduce(
            AppState::default(),
            AppAction::SetChats(vec![
                chat("5491100000001", 30, &["vip"]),
                chat("5491100000002", 5, &[]),
            ]),
            now(),
        )
    }

    #[test]
    fn add_message_updates_chat_summary() {
        let state = reduce(
            seeded(),
            AppAction::AddMessage {
                chat_id: "5491100000001".into(),
                message: message("5491100000001", "hola"),
            },
            now(),
        );
        assert_eq!(state.messages_of("5491100000001").len(), 1);
        let chat = state.chats.iter().find(|c| c.id == "5491100000001").unwrap();
        assert_eq!(chat.last_message, "hola");
        assert_eq!(chat.timestamp, Some(now()));
    }

    #[test]
    fn update_chat_merges_fields() {
        let state = reduce(
            seeded(),
            AppAction::UpdateChat {
                id: "5491100000002".into(),
                patch: ChatPatch {
                    name: Some("Ana".into()),
                    is_agendado: Some(true),
                    ..Default::default()
                },
            },
            now(),
        );
        let chat = &state.chats[1];
        assert_eq!(chat.name, "Ana");
        assert!(chat.is_agendado);
        assert_eq!(chat.phone_number, "5491100000002");
    }

    #[test]
    fn delete_category_strips_it_from_chats() {
        let mut state = seeded();
        state.apply(AppAction::SetCategories(vec![category("vip")]), now());
        state.apply(AppAction::ToggleCategoryFilter("vip".into()), now());
        state.apply(AppAction::DeleteCategory("vip".into()), now());

        assert!(state.categories.is_empty());
        assert!(state.chats.iter().all(|c| c.categories.is_empty()));
        assert!(state.selected_categories.is_empty());
    }

    #[test]
    fn toggle_category_filter_flips_membership() {
        let mut state = AppState::default();
        state.apply(AppAction::ToggleCategoryFilter("vip".into()), now());
        assert_eq!(state.selected_categories, vec!["vip".to_string()]);
        state.apply(AppAction::ToggleCategoryFilter("vip".into()), now());
        assert!(state.selected_categories.is_empty());
    }

    #[test]
    fn visible_chats_respects_tab_and_categories() {
        let mut state = seeded();
        let ids: Vec<_> = state.visible_chats("").into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["5491100000002", "5491100000001"]);

        state.apply(AppAction::SetSelectedCategories(vec!["vip".into()]), now());
        assert_eq!(state.visible_chats("").len(), 1);

        state.apply(AppAction::SetActiveTab(ChatTab::Contacts), now());
        assert!(state.visible_chats("").is_empty());
    }

    #[test]
    fn unknown_contacts_are_removed_by_phone() {
        let mut state = seeded();
        let contact = UnknownContact::from(&state.chats[0]);
        state.apply(AppAction::AddUnknownContact(contact), now());
        state.apply(AppAction::RemoveUnknownContact("5491100000001".into()), now());
        assert!(state.unknown_contacts.is_empty());
    }

    #[test]
    fn change_events_map_to_snapshot_actions() {
        let action = AppAction::from(ChangeEvent::AdminProfile(None));
        assert_eq!(action, AppAction::SetAdminProfile(AdminProfile::default()));

        let mut state = AppState::default();
        state.apply(
            ChangeEvent::Messages {
                chat_id: "5491100000001".into(),
                messages: vec![message("5491100000001", "hola")],
            }
            .into(),
            now(),
        );
        assert_eq!(state.messages_of("5491100000001")[0].content, "hola");
    }

    #[test]
    fn admin_profile_patch_keeps_other_fields() {
        let mut state = AppState::default();
        state.apply(
            AppAction::SetAdminProfile(AdminProfile {
                name: "Soporte".into(),
                about: "24hs".into(),
                ..Default::default()
            }),
            now(),
        );
        state.apply(
            AppAction::UpdateAdminProfile(AdminProfilePatch {
                online: Some(true),
                ..Default::default()
            }),
            now(),
        );
        assert_eq!(state.admin_profile.name, "Soporte");
        assert!(state.admin_profile.online);
    }
}
