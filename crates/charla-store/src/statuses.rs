//! Admin statuses: image posts that stay visible for 24 hours.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use charla_shared::constants::STATUS_TTL_HOURS;
use charla_shared::models::{AdminStatus, StatusPatch};

use crate::convert::{parse_ts, ts};
use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Every stored status, newest first, expired ones included.
    pub fn fetch_admin_statuses(&self) -> Result<Vec<AdminStatus>> {
        self.query_statuses(
            "SELECT id, image_url, caption, timestamp FROM admin_statuses
             ORDER BY timestamp DESC, id ASC",
            None,
        )
    }

    /// Statuses posted within the last 24 hours, newest first.
    pub fn fetch_active_statuses(&self, now: DateTime<Utc>) -> Result<Vec<AdminStatus>> {
        let cutoff = now - Duration::hours(STATUS_TTL_HOURS);
        let statuses = self.query_statuses(
            "SELECT id, image_url, caption, timestamp FROM admin_statuses
             WHERE timestamp > ?1
             ORDER BY timestamp DESC, id ASC",
            Some(ts(cutoff)),
        )?;
        // RFC 3339 strings only compare correctly when they share an offset;
        // recheck in Rust so the boundary is exact.
        Ok(statuses.into_iter().filter(|s| s.is_active(now)).collect())
    }

    fn query_statuses(&self, sql: &str, cutoff: Option<String>) -> Result<Vec<AdminStatus>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = match cutoff {
            Some(cutoff) => stmt.query_map(params![cutoff], row_to_status)?,
            None => stmt.query_map([], row_to_status)?,
        };

        let mut statuses = Vec::new();
        for row in rows {
            statuses.push(row?);
        }
        Ok(statuses)
    }

    pub fn add_admin_status(
        &self,
        image_url: &str,
        caption: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminStatus> {
        let image_url = image_url.trim();
        if image_url.is_empty() {
            return Err(StoreError::InvalidInput("status image is required".into()));
        }
        let status = AdminStatus {
            id: Uuid::new_v4().to_string(),
            image_url: image_url.to_string(),
            caption: caption.trim().to_string(),
            timestamp: now,
        };
        self.conn().execute(
            "INSERT INTO admin_statuses (id, image_url, caption, timestamp, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![status.id, status.image_url, status.caption, ts(now)],
        )?;

        tracing::debug!(id = %status.id, "admin status posted");
        Ok(status)
    }

    /// Edit a status. The posting time, and therefore the expiry, is kept.
    pub fn update_admin_status(
        &self,
        id: &str,
        patch: StatusPatch,
        now: DateTime<Utc>,
    ) -> Result<AdminStatus> {
        let mut status = self.fetch_admin_status(id)?;
        if let Some(url) = patch.image_url {
            if url.trim().is_empty() {
                return Err(StoreError::InvalidInput("status image is required".into()));
            }
            status.image_url = url.trim().to_string();
        }
        if let Some(caption) = patch.caption {
            status.caption = caption.trim().to_string();
        }
        self.conn().execute(
            "UPDATE admin_statuses SET image_url = ?1, caption = ?2, updated_at = ?3
             WHERE id = ?4",
            params![status.image_url, status.caption, ts(now), id],
        )?;
        Ok(status)
    }

    /// Delete a status and return it, so the caller can remove its image.
    pub fn delete_admin_status(&self, id: &str) -> Result<Option<AdminStatus>> {
        let status = match self.fetch_admin_status(id) {
            Ok(status) => status,
            Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.conn()
            .execute("DELETE FROM admin_statuses WHERE id = ?1", params![id])?;
        Ok(Some(status))
    }

    pub fn fetch_admin_status(&self, id: &str) -> Result<AdminStatus> {
        self.conn()
            .query_row(
                "SELECT id, image_url, caption, timestamp FROM admin_statuses WHERE id = ?1",
                params![id],
                row_to_status,
            )
            .optional()?
            .ok_or(StoreError::NotFound)
    }
}

fn row_to_status(row: &rusqlite::Row<'_>) -> rusqlite::Result<AdminStatus> {
    let ts_str: String = row.get(3)?;
    Ok(AdminStatus {
        id: row.get(0)?,
        image_url: row.get(1)?,
        caption: row.get(2)?,
        timestamp: parse_ts(3, &ts_str)?,
    })
}
