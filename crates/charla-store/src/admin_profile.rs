//! The single admin profile document.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use charla_shared::constants::ADMIN_PROFILE_ID;
use charla_shared::models::{AdminProfile, AdminProfilePatch};

use crate::convert::{opt_ts, parse_opt_ts};
use crate::database::Database;
use crate::error::Result;

impl Database {
    /// The admin profile, or `None` before it has ever been saved.
    pub fn fetch_admin_profile(&self) -> Result<Option<AdminProfile>> {
        let profile = self
            .conn()
            .query_row(
                "SELECT name, avatar, about, online, updated_at FROM admin_profile WHERE id = ?1",
                params![ADMIN_PROFILE_ID],
                |row| {
                    Ok(AdminProfile {
                        name: row.get(0)?,
                        avatar: row.get(1)?,
                        about: row.get(2)?,
                        online: row.get(3)?,
                        updated_at: parse_opt_ts(4, row.get(4)?)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    /// Merge `patch` into the profile, creating it on first use.
    pub fn update_admin_profile(
        &self,
        patch: AdminProfilePatch,
        now: DateTime<Utc>,
    ) -> Result<AdminProfile> {
        let mut profile = self.fetch_admin_profile()?.unwrap_or_default();
        patch.apply(&mut profile, now);

        self.conn().execute(
            "INSERT INTO admin_profile (id, name, avatar, about, online, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 avatar = excluded.avatar,
                 about = excluded.about,
                 online = excluded.online,
                 updated_at = excluded.updated_at",
            params![
                ADMIN_PROFILE_ID,
                profile.name,
                profile.avatar,
                profile.about,
                profile.online,
                opt_ts(profile.updated_at),
            ],
        )?;
        Ok(profile)
    }

    pub fn set_admin_online(&self, online: bool, now: DateTime<Utc>) -> Result<AdminProfile> {
        self.update_admin_profile(
            AdminProfilePatch {
                online: Some(online),
                ..Default::default()
            },
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn absent_until_first_update() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.fetch_admin_profile().unwrap().is_none());

        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let saved = db
            .update_admin_profile(
                AdminProfilePatch {
                    name: Some("Soporte".into()),
                    about: Some("Atención 24hs".into()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        assert_eq!(saved.name, "Soporte");
        assert_eq!(saved.updated_at, Some(now));

        let online = db.set_admin_online(true, now).unwrap();
        assert!(online.online);
        assert_eq!(online.about, "Atención 24hs");
        assert_eq!(db.fetch_admin_profile().unwrap(), Some(online));
    }
}
