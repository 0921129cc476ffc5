//! Chat categories (labels) and their usage counts.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use charla_shared::models::{Category, CategoryPatch};

use crate::convert::{parse_opt_ts, ts};
use crate::database::Database;
use crate::error::{Result, StoreError};

/// `count` is derived from the JSON `categories` array of every chat.
const SELECT_WITH_COUNT: &str = "SELECT c.id, c.name, c.color, c.created_at, c.updated_at,
        (SELECT COUNT(*) FROM chats, json_each(chats.categories) j WHERE j.value = c.id)
     FROM categories c";

impl Database {
    /// All categories ordered by name.
    pub fn fetch_categories(&self) -> Result<Vec<Category>> {
        let sql = format!("{SELECT_WITH_COUNT} ORDER BY c.name COLLATE NOCASE ASC, c.id ASC");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_category)?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }

    pub fn fetch_category(&self, id: &str) -> Result<Category> {
        let sql = format!("{SELECT_WITH_COUNT} WHERE c.id = ?1");
        self.conn()
            .query_row(&sql, params![id], row_to_category)
            .map_err(StoreError::from_query)
    }

    pub fn add_category(&self, name: &str, color: &str, now: DateTime<Utc>) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("category name is required".into()));
        }
        let id = Uuid::new_v4().to_string();
        self.conn().execute(
            "INSERT INTO categories (id, name, color, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, name, color.trim(), ts(now)],
        )?;

        tracing::debug!(%id, name, "category added");
        self.fetch_category(&id)
    }

    pub fn update_category(
        &self,
        id: &str,
        patch: CategoryPatch,
        now: DateTime<Utc>,
    ) -> Result<Category> {
        let mut current = self.fetch_category(id)?;
        if let Some(name) = patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(StoreError::InvalidInput("category name is required".into()));
            }
            current.name = name.to_string();
        }
        if let Some(color) = patch.color {
            current.color = color.trim().to_string();
        }

        self.conn().execute(
            "UPDATE categories SET name = ?1, color = ?2, updated_at = ?3 WHERE id = ?4",
            params![current.name, current.color, ts(now), id],
        )?;
        current.updated_at = Some(now);
        Ok(current)
    }

    /// Delete a category and strip its id from every chat that carries it.
    ///
    /// Returns `false` if the category did not exist.
    pub fn delete_category(&mut self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;
        let deleted = tx.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Ok(false);
        }

        let stripped = tx.execute(
            "UPDATE chats SET
                 categories = (SELECT COALESCE(json_group_array(j.value), '[]')
                               FROM json_each(chats.categories) j WHERE j.value != ?1),
                 updated_at = ?2
             WHERE EXISTS (SELECT 1 FROM json_each(chats.categories) j WHERE j.value = ?1)",
            params![id, ts(now)],
        )?;
        tx.commit()?;

        tracing::debug!(%id, chats = stripped, "category deleted");
        Ok(true)
    }
}

fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        created_at: parse_opt_ts(3, row.get(3)?)?,
        updated_at: parse_opt_ts(4, row.get(4)?)?,
        count: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn add_and_count_usage() {
        let db = Database::open_in_memory().unwrap();
        let vip = db.add_category(" VIP ", "#25d366", now()).unwrap();
        let other = db.add_category("Mayorista", "#ff0000", now()).unwrap();
        assert_eq!(vip.name, "VIP");
        assert_eq!(vip.count, 0);

        db.ensure_chat("5491100000001", now()).unwrap();
        db.ensure_chat("5491100000002", now()).unwrap();
        db.edit_contact("5491100000001", "Ana", &[vip.id.clone()], now())
            .unwrap();
        db.edit_contact(
            "5491100000002",
            "Luis",
            &[vip.id.clone(), other.id.clone()],
            now(),
        )
        .unwrap();

        let counts: Vec<(String, u32)> = db
            .fetch_categories()
            .unwrap()
            .into_iter()
            .map(|c| (c.name, c.count))
            .collect();
        assert_eq!(
            counts,
            vec![("Mayorista".to_string(), 1), ("VIP".to_string(), 2)]
        );
    }

    #[test]
    fn rejects_blank_name() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.add_category("  ", "#000", now()),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn update_keeps_unpatched_fields() {
        let db = Database::open_in_memory().unwrap();
        let cat = db.add_category("VIP", "#25d366", now()).unwrap();
        let updated = db
            .update_category(
                &cat.id,
                CategoryPatch {
                    color: Some("#000000".into()),
                    ..Default::default()
                },
                now(),
            )
            .unwrap();
        assert_eq!(updated.name, "VIP");
        assert_eq!(updated.color, "#000000");
        assert_eq!(db.fetch_category(&cat.id).unwrap(), updated);
    }

    #[test]
    fn delete_strips_category_from_chats() {
        let mut db = Database::open_in_memory().unwrap();
        let vip = db.add_category("VIP", "#25d366", now()).unwrap();
        let keep = db.add_category("Nuevo", "#0000ff", now()).unwrap();
        db.ensure_chat("5491100000001", now()).unwrap();
        db.edit_contact(
            "5491100000001",
            "Ana",
            &[vip.id.clone(), keep.id.clone()],
            now(),
        )
        .unwrap();

        assert!(db.delete_category(&vip.id, now()).unwrap());
        assert!(!db.delete_category(&vip.id, now()).unwrap());

        let chat = db.fetch_chat("5491100000001").unwrap();
        assert_eq!(chat.categories, vec![keep.id]);
        assert_eq!(db.fetch_categories().unwrap().len(), 1);
    }
}
