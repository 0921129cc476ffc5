//! CRUD operations for [`Chat`] documents.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use charla_shared::models::{Chat, ChatPatch, UnknownContact};
use charla_shared::time::TimeFormatter;

use crate::convert::{opt_ts, parse_json, parse_opt_ts, ts};
use crate::database::Database;
use crate::error::{Result, StoreError};

pub(crate) const CHAT_COLUMNS: &str = "id, name, phone_number, last_message, timestamp, \
     avatar, photo_url, user_avatar, about, online, categories, unread_count, is_agendado, \
     is_blocked, blocked_at, last_message_user, last_message_user_timestamp, \
     last_message_admin, last_message_admin_timestamp, last_read_by_admin, \
     last_read_message_id, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// All chats, most recently updated first.
    pub fn fetch_chats(&self) -> Result<Vec<Chat>> {
        let sql = format!("SELECT {CHAT_COLUMNS} FROM chats ORDER BY updated_at DESC, id ASC");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    /// Fetch a single chat by id (phone number).
    pub fn fetch_chat(&self, id: &str) -> Result<Chat> {
        let sql = format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1");
        self.conn()
            .query_row(&sql, params![id], row_to_chat)
            .map_err(StoreError::from_query)
    }

    pub fn chat_exists(&self, id: &str) -> Result<bool> {
        let found = self
            .conn()
            .query_row("SELECT 1 FROM chats WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Chats the admin has not saved as contacts yet.
    pub fn fetch_unknown_contacts(&self) -> Result<Vec<UnknownContact>> {
        Ok(self
            .fetch_chats()?
            .iter()
            .filter(|c| !c.is_agendado)
            .map(UnknownContact::from)
            .collect())
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Create an empty chat for `phone` unless one exists.
    ///
    /// Returns the stored chat and whether it was created by this call.
    pub fn ensure_chat(&self, phone: &str, now: DateTime<Utc>) -> Result<(Chat, bool)> {
        if phone.trim().is_empty() {
            return Err(StoreError::InvalidInput("empty chat id".into()));
        }
        let created = self.conn().execute(
            "INSERT OR IGNORE INTO chats (id, phone_number, timestamp, created_at, updated_at)
             VALUES (?1, ?1, ?2, ?2, ?2)",
            params![phone, ts(now)],
        )? > 0;

        if created {
            tracing::debug!(chat = %phone, "created chat");
        }
        Ok((self.fetch_chat(phone)?, created))
    }

    /// Merge `patch` into the chat, creating it if missing.
    pub fn upsert_chat(
        &self,
        id: &str,
        patch: ChatPatch,
        fmt: &TimeFormatter,
        now: DateTime<Utc>,
    ) -> Result<Chat> {
        if id.trim().is_empty() {
            return Err(StoreError::InvalidInput("empty chat id".into()));
        }
        let mut chat = match self.fetch_chat(id) {
            Ok(chat) => chat,
            Err(StoreError::NotFound) => Chat::new(id, now),
            Err(e) => return Err(e),
        };
        patch.apply(&mut chat, fmt, now);
        self.write_chat(&chat)?;
        Ok(chat)
    }

    /// Save the contact under `name` with the given categories. This is
    /// what promotes an unknown number to an agendado contact.
    pub fn edit_contact(
        &self,
        id: &str,
        name: &str,
        categories: &[String],
        now: DateTime<Utc>,
    ) -> Result<Chat> {
        let affected = self.conn().execute(
            "UPDATE chats SET name = ?1, categories = ?2, is_agendado = 1, updated_at = ?3
             WHERE id = ?4",
            params![name.trim(), serde_json::to_string(categories)?, ts(now), id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_chat(id)
    }

    pub fn block_contact(&self, id: &str, now: DateTime<Utc>) -> Result<Chat> {
        let affected = self.conn().execute(
            "UPDATE chats SET is_blocked = 1, blocked_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![ts(now), id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_chat(id)
    }

    pub fn unblock_contact(&self, id: &str, now: DateTime<Utc>) -> Result<Chat> {
        let affected = self.conn().execute(
            "UPDATE chats SET is_blocked = 0, blocked_at = NULL, updated_at = ?1 WHERE id = ?2",
            params![ts(now), id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_chat(id)
    }

    /// Insert or fully overwrite a chat row.
    ///
    /// Uses an upsert rather than `INSERT OR REPLACE` so the row is never
    /// deleted, which would cascade into its messages.
    pub(crate) fn write_chat(&self, chat: &Chat) -> Result<()> {
        let assignments = CHAT_COLUMNS
            .split(',')
            .map(str::trim)
            .filter(|col| *col != "id")
            .map(|col| format!("{col} = excluded.{col}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO chats ({CHAT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23)
             ON CONFLICT(id) DO UPDATE SET {assignments}"
        );
        self.conn().execute(
            &sql,
            params![
                chat.id,
                chat.name,
                chat.phone_number,
                chat.last_message,
                opt_ts(chat.timestamp),
                chat.avatar,
                chat.photo_url,
                chat.user_avatar,
                chat.about,
                chat.online,
                serde_json::to_string(&chat.categories)?,
                chat.unread_count,
                chat.is_agendado,
                chat.is_blocked,
                opt_ts(chat.blocked_at),
                chat.last_message_user,
                opt_ts(chat.last_message_user_timestamp),
                chat.last_message_admin,
                opt_ts(chat.last_message_admin_timestamp),
                opt_ts(chat.last_read_by_admin),
                chat.last_read_message_id,
                opt_ts(chat.created_at),
                opt_ts(chat.updated_at),
            ],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a row selected with [`CHAT_COLUMNS`] to a [`Chat`].
pub(crate) fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let categories_json: String = row.get(10)?;

    Ok(Chat {
        id: row.get(0)?,
        name: row.get(1)?,
        phone_number: row.get(2)?,
        last_message: row.get(3)?,
        timestamp: parse_opt_ts(4, row.get(4)?)?,
        avatar: row.get(5)?,
        photo_url: row.get(6)?,
        user_avatar: row.get(7)?,
        about: row.get(8)?,
        online: row.get(9)?,
        categories: parse_json(10, &categories_json)?,
        unread_count: row.get(11)?,
        is_agendado: row.get(12)?,
        is_blocked: row.get(13)?,
        blocked_at: parse_opt_ts(14, row.get(14)?)?,
        last_message_user: row.get(15)?,
        last_message_user_timestamp: parse_opt_ts(16, row.get(16)?)?,
        last_message_admin: row.get(17)?,
        last_message_admin_timestamp: parse_opt_ts(18, row.get(18)?)?,
        last_read_by_admin: parse_opt_ts(19, row.get(19)?)?,
        last_read_message_id: row.get(20)?,
        created_at: parse_opt_ts(21, row.get(21)?)?,
        updated_at: parse_opt_ts(22, row.get(22)?)?,
    })
}
