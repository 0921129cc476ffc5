//! Chat list filtering and ordering for the admin sidebar.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::Chat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatTab {
    /// Every chat.
    #[default]
    Chats,
    /// Saved (agendado) contacts only.
    Contacts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatFilter {
    pub search: String,
    pub tab: ChatTab,
    /// Selected category ids. Empty selects everything.
    pub categories: BTreeSet<String>,
}

impl ChatFilter {
    pub fn matches(&self, chat: &Chat) -> bool {
        self.matches_search(chat)
            && self.matches_tab(chat)
            && matches_categories(&chat.categories, &self.categories)
    }

    fn matches_search(&self, chat: &Chat) -> bool {
        let query = self.search.trim();
        if query.is_empty() {
            return true;
        }
        let lowered = query.to_lowercase();
        chat.name.to_lowercase().contains(&lowered)
            || chat.phone_number.contains(query)
            || chat.last_message.to_lowercase().contains(&lowered)
    }

    fn matches_tab(&self, chat: &Chat) -> bool {
        match self.tab {
            ChatTab::Chats => true,
            ChatTab::Contacts => chat.is_agendado,
        }
    }
}

/// `true` iff `chat_categories` intersects `selected`, or nothing is selected.
pub fn matches_categories(chat_categories: &[String], selected: &BTreeSet<String>) -> bool {
    selected.is_empty() || chat_categories.iter().any(|id| selected.contains(id))
}

/// Most recent activity first. Chats without any timestamp sink to the end.
pub fn sort_by_recent_activity(chats: &mut [Chat]) {
    chats.sort_by(|a, b| b.activity_millis().cmp(&a.activity_millis()));
}

pub fn filter_and_sort(chats: &[Chat], filter: &ChatFilter) -> Vec<Chat> {
    let mut visible: Vec<Chat> = chats.iter().filter(|c| filter.matches(c)).cloned().collect();
    sort_by_recent_activity(&mut visible);
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn chat(id: &str, cats: &[&str]) -> Chat {
        let base = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        Chat {
            categories: cats.iter().map(|c| c.to_string()).collect(),
            ..Chat::new(id, base)
        }
    }

    fn selection(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_selection_matches_all() {
        assert!(matches_categories(&[], &BTreeSet::new()));
        assert!(matches_categories(&["a".into()], &BTreeSet::new()));
    }

    #[test]
    fn category_intersection() {
        let sel = selection(&["vip", "mayorista"]);
        assert!(matches_categories(&["vip".into()], &sel));
        assert!(!matches_categories(&["nuevo".into()], &sel));
        assert!(!matches_categories(&[], &sel));
    }

    #[test]
    fn search_is_case_insensitive_on_name_and_message() {
        let mut c = chat("5491100000001", &[]);
        c.name = "María".into();
        c.last_message = "Quiero CARGAR fichas".into();

        let mut filter = ChatFilter {
            search: "marí".into(),
            ..Default::default()
        };
        assert!(filter.matches(&c));

        filter.search = "cargar".into();
        assert!(filter.matches(&c));

        filter.search = "0001".into();
        assert!(filter.matches(&c));

        filter.search = "pedro".into();
        assert!(!filter.matches(&c));
    }

    #[test]
    fn contacts_tab_only_shows_agendado() {
        let mut saved = chat("5491100000001", &[]);
        saved.is_agendado = true;
        let unknown = chat("5491100000002", &[]);

        let filter = ChatFilter {
            tab: ChatTab::Contacts,
            ..Default::default()
        };
        let visible = filter_and_sort(&[saved.clone(), unknown], &filter);
        assert_eq!(visible, vec![saved]);
    }

    #[test]
    fn sorts_by_user_activity_then_timestamp() {
        let base = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let mut old = chat("1", &[]);
        old.timestamp = Some(base - Duration::hours(5));
        let mut recent_user = chat("2", &[]);
        recent_user.timestamp = Some(base - Duration::hours(10));
        recent_user.last_message_user_timestamp = Some(base);
        let mut none = chat("3", &[]);
        none.timestamp = None;

        let mut chats = vec![none, old, recent_user];
        sort_by_recent_activity(&mut chats);
        let ids: Vec<_> = chats.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["2", "1", "3"]);
    }
}
