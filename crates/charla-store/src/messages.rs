//! Message documents and the read/unread bookkeeping on their parent chat.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction};
use uuid::Uuid;

use charla_shared::constants::{MAX_MESSAGE_SIZE, WELCOME_MESSAGE};
use charla_shared::models::{Message, MessageKind, MessageStatus, Receipts};

use crate::convert::{parse_enum, parse_opt_ts, parse_ts, ts};
use crate::database::Database;
use crate::error::{Result, StoreError};

const MESSAGE_COLUMNS: &str = "id, chat_id, content, timestamp, is_outgoing, kind, filename, \
     status, sent_at, delivered_at, read_at";

/// A message about to be written.
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub chat_id: &'a str,
    pub content: &'a str,
    /// `true` when the admin is the sender.
    pub is_outgoing: bool,
    pub kind: MessageKind,
    pub filename: Option<&'a str>,
}

impl<'a> NewMessage<'a> {
    pub fn text(chat_id: &'a str, content: &'a str, is_outgoing: bool) -> Self {
        Self {
            chat_id,
            content,
            is_outgoing,
            kind: MessageKind::Text,
            filename: None,
        }
    }
}

impl Database {
    /// Write a message and refresh the parent chat's summary fields.
    ///
    /// Both writes share one transaction: the last-message snapshot for the
    /// sender's side, the chat timestamp and, for incoming messages, the
    /// unread counter either all change or none do.
    pub fn send_message(&mut self, new: NewMessage<'_>, now: DateTime<Utc>) -> Result<Message> {
        let content = new.content.trim();
        if new.chat_id.is_empty() || content.is_empty() {
            return Err(StoreError::InvalidInput("Invalid message parameters".into()));
        }
        if content.len() > MAX_MESSAGE_SIZE {
            return Err(StoreError::InvalidInput(format!(
                "message exceeds {MAX_MESSAGE_SIZE} bytes"
            )));
        }

        let filename = new
            .filename
            .filter(|_| new.kind.carries_filename())
            .map(str::to_string);

        let message = Message {
            id: Uuid::new_v4().to_string(),
            chat_id: new.chat_id.to_string(),
            content: content.to_string(),
            timestamp: now,
            is_outgoing: new.is_outgoing,
            kind: new.kind,
            filename,
            status: MessageStatus::Sent,
            receipts: Receipts {
                sent: Some(now),
                ..Default::default()
            },
        };

        let tx = self.conn_mut().transaction()?;
        insert_message(&tx, &message)?;

        let summary_sql = if message.is_outgoing {
            "UPDATE chats SET last_message = ?1, timestamp = ?2, updated_at = ?2,
                 last_message_admin = ?1, last_message_admin_timestamp = ?2
             WHERE id = ?3"
        } else {
            "UPDATE chats SET last_message = ?1, timestamp = ?2, updated_at = ?2,
                 last_message_user = ?1, last_message_user_timestamp = ?2,
                 unread_count = unread_count + 1
             WHERE id = ?3"
        };
        let affected = tx.execute(
            summary_sql,
            params![message.content, ts(now), message.chat_id],
        )?;
        if affected == 0 {
            // Dropping the transaction rolls back the message insert.
            return Err(StoreError::NotFound);
        }
        tx.commit()?;

        tracing::debug!(
            chat = %message.chat_id,
            id = %message.id,
            outgoing = message.is_outgoing,
            kind = message.kind.as_str(),
            "message stored"
        );
        Ok(message)
    }

    /// Send the welcome message if the chat has no messages yet.
    pub fn send_initial_message(
        &mut self,
        chat_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Message>> {
        let existing: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
            params![chat_id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Ok(None);
        }
        self.send_message(NewMessage::text(chat_id, WELCOME_MESSAGE, true), now)
            .map(Some)
    }

    /// All messages of a chat in the order they were written.
    pub fn fetch_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ?1 ORDER BY seq ASC"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![chat_id], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn fetch_message(&self, chat_id: &str, id: &str) -> Result<Message> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ?1 AND id = ?2");
        self.conn()
            .query_row(&sql, params![chat_id, id], row_to_message)
            .map_err(StoreError::from_query)
    }

    pub fn mark_message_delivered(
        &self,
        chat_id: &str,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        self.advance_status(chat_id, id, MessageStatus::Delivered, now)
    }

    pub fn mark_message_read(&self, chat_id: &str, id: &str, now: DateTime<Utc>) -> Result<Message> {
        self.advance_status(chat_id, id, MessageStatus::Read, now)
    }

    /// Move a message's status forward and stamp the matching receipt.
    /// A request that would move it backward (or nowhere) is a no-op.
    fn advance_status(
        &self,
        chat_id: &str,
        id: &str,
        target: MessageStatus,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        let mut message = self.fetch_message(chat_id, id)?;
        let Some(next) = message.status.advance(target) else {
            tracing::debug!(
                id,
                current = message.status.as_str(),
                requested = target.as_str(),
                "ignoring non-forward status change"
            );
            return Ok(message);
        };

        let column = receipt_column(next);
        let sql = format!("UPDATE messages SET status = ?1, {column} = ?2 WHERE id = ?3");
        self.conn()
            .execute(&sql, params![next.as_str(), ts(now), id])?;

        message.status = next;
        message.receipts.stamp(next, now);
        Ok(message)
    }

    /// Admin opened the chat: zero the unread counter and flip every
    /// incoming message that is not yet read. Returns how many flipped.
    pub fn reset_unread_count(&mut self, chat_id: &str, now: DateTime<Utc>) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;
        let affected = tx.execute(
            "UPDATE chats SET unread_count = 0, last_read_by_admin = ?1 WHERE id = ?2",
            params![ts(now), chat_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        let flipped = mark_incoming_read(&tx, chat_id, None, now)?;
        tx.commit()?;

        tracing::debug!(chat = %chat_id, flipped, "chat marked read");
        Ok(flipped)
    }

    /// Mark incoming messages read up to and including `last_message_id`
    /// and reset the unread counter to 0.
    pub fn mark_messages_read_up_to(
        &mut self,
        chat_id: &str,
        last_message_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;

        let cursor: i64 = tx
            .query_row(
                "SELECT seq FROM messages WHERE chat_id = ?1 AND id = ?2",
                params![chat_id, last_message_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;

        let flipped = mark_incoming_read(&tx, chat_id, Some(cursor), now)?;

        tx.execute(
            "UPDATE chats SET unread_count = 0, last_read_message_id = ?1,
                 last_read_by_admin = ?2
             WHERE id = ?3",
            params![last_message_id, ts(now), chat_id],
        )?;
        tx.commit()?;
        Ok(flipped)
    }
}

fn insert_message(tx: &Transaction<'_>, message: &Message) -> Result<()> {
    tx.execute(
        "INSERT INTO messages (id, chat_id, content, timestamp, is_outgoing, kind, filename,
                               status, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            message.id,
            message.chat_id,
            message.content,
            ts(message.timestamp),
            message.is_outgoing,
            message.kind.as_str(),
            message.filename,
            message.status.as_str(),
            message.receipts.sent.map(ts),
        ],
    )?;
    Ok(())
}

fn mark_incoming_read(
    tx: &Transaction<'_>,
    chat_id: &str,
    up_to_seq: Option<i64>,
    now: DateTime<Utc>,
) -> Result<usize> {
    let flipped = tx.execute(
        "UPDATE messages SET status = 'read', read_at = ?1
         WHERE chat_id = ?2 AND is_outgoing = 0 AND status != 'read'
           AND (?3 IS NULL OR seq <= ?3)",
        params![ts(now), chat_id, up_to_seq],
    )?;
    Ok(flipped)
}

fn receipt_column(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Sent => "sent_at",
        MessageStatus::Delivered => "delivered_at",
        MessageStatus::Read => "read_at",
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let ts_str: String = row.get(3)?;
    let kind_str: String = row.get(5)?;
    let status_str: String = row.get(7)?;

    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        content: row.get(2)?,
        timestamp: parse_ts(3, &ts_str)?,
        is_outgoing: row.get(4)?,
        kind: parse_enum(5, &kind_str, MessageKind::parse)?,
        filename: row.get(6)?,
        status: parse_enum(7, &status_str, MessageStatus::parse)?,
        receipts: Receipts {
            sent: parse_opt_ts(8, row.get(8)?)?,
            delivered: parse_opt_ts(9, row.get(9)?)?,
            read: parse_opt_ts(10, row.get(10)?)?,
        },
    })
}
