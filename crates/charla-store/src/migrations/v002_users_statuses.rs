use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS admin_profile (
    id         TEXT PRIMARY KEY NOT NULL CHECK (id = 'main'),
    name       TEXT NOT NULL DEFAULT '',
    avatar     TEXT,
    about      TEXT NOT NULL DEFAULT '',
    online     INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS admin_statuses (
    id         TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    image_url  TEXT NOT NULL,
    caption    TEXT NOT NULL DEFAULT '',
    timestamp  TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_admin_statuses_ts ON admin_statuses(timestamp DESC);

CREATE TABLE IF NOT EXISTS users (
    phone_number TEXT PRIMARY KEY NOT NULL,
    name         TEXT,
    avatar       TEXT,
    about        TEXT,
    updated_at   TEXT
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
