//! v001 -- Initial schema creation.
//!
//! Creates the chat-side tables: `chats`, `messages` and `categories`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Chats (one per customer phone number)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id                            TEXT PRIMARY KEY NOT NULL,  -- canonical phone number
    name                          TEXT NOT NULL DEFAULT '',
    phone_number                  TEXT NOT NULL,
    last_message                  TEXT NOT NULL DEFAULT '',
    timestamp                     TEXT,                       -- RFC-3339
    avatar                        TEXT,
    photo_url                     TEXT,
    user_avatar                   TEXT,
    about                         TEXT,
    online                        INTEGER NOT NULL DEFAULT 0,
    categories                    TEXT NOT NULL DEFAULT '[]', -- JSON array of category ids
    unread_count                  INTEGER NOT NULL DEFAULT 0,
    is_agendado                   INTEGER NOT NULL DEFAULT 0,
    is_blocked                    INTEGER NOT NULL DEFAULT 0,
    blocked_at                    TEXT,
    last_message_user             TEXT,
    last_message_user_timestamp   TEXT,
    last_message_admin            TEXT,
    last_message_admin_timestamp  TEXT,
    last_read_by_admin            TEXT,
    last_read_message_id          TEXT,
    created_at                    TEXT,
    updated_at                    TEXT
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order, read cursor
    id           TEXT NOT NULL UNIQUE,               -- UUID v4
    chat_id      TEXT NOT NULL,                      -- FK -> chats(id)
    content      TEXT NOT NULL,
    timestamp    TEXT NOT NULL,
    is_outgoing  INTEGER NOT NULL,                   -- 1 = admin -> user
    kind         TEXT NOT NULL,                      -- text | image | document
    filename     TEXT,
    status       TEXT NOT NULL,                      -- sent | delivered | read
    sent_at      TEXT,
    delivered_at TEXT,
    read_at      TEXT,

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_seq ON messages(chat_id, seq);

-- ----------------------------------------------------------------
-- Categories
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS categories (
    id         TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    name       TEXT NOT NULL,
    color      TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
