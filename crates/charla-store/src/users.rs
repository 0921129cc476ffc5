//! End-user profiles keyed by phone number.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use charla_shared::models::{UserProfile, UserProfilePatch};

use crate::convert::{opt_ts, parse_opt_ts};
use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    pub fn fetch_user_profile(&self, phone: &str) -> Result<Option<UserProfile>> {
        let profile = self
            .conn()
            .query_row(
                "SELECT phone_number, name, avatar, about, updated_at FROM users
                 WHERE phone_number = ?1",
                params![phone],
                |row| {
                    Ok(UserProfile {
                        phone_number: row.get(0)?,
                        name: row.get(1)?,
                        avatar: row.get(2)?,
                        about: row.get(3)?,
                        updated_at: parse_opt_ts(4, row.get(4)?)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    /// Merge `patch` into the user's profile, creating it if needed.
    ///
    /// A new avatar is mirrored onto the chat's `userAvatar` so the admin
    /// list picks it up without a second lookup.
    pub fn update_user_profile(
        &self,
        phone: &str,
        patch: UserProfilePatch,
        now: DateTime<Utc>,
    ) -> Result<UserProfile> {
        if phone.trim().is_empty() {
            return Err(StoreError::InvalidInput("empty phone number".into()));
        }
        let mut profile = self
            .fetch_user_profile(phone)?
            .unwrap_or_else(|| UserProfile {
                phone_number: phone.to_string(),
                ..Default::default()
            });
        patch.apply(&mut profile, now);

        self.conn().execute(
            "INSERT INTO users (phone_number, name, avatar, about, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(phone_number) DO UPDATE SET
                 name = excluded.name,
                 avatar = excluded.avatar,
                 about = excluded.about,
                 updated_at = excluded.updated_at",
            params![
                profile.phone_number,
                profile.name,
                profile.avatar,
                profile.about,
                opt_ts(profile.updated_at),
            ],
        )?;

        if let Some(avatar) = &profile.avatar {
            self.conn().execute(
                "UPDATE chats SET user_avatar = ?1 WHERE id = ?2",
                params![avatar, phone],
            )?;
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn merge_and_mirror_avatar() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        db.ensure_chat("5491100000001", now).unwrap();
        assert!(db.fetch_user_profile("5491100000001").unwrap().is_none());

        db.update_user_profile(
            "5491100000001",
            UserProfilePatch {
                name: Some("Ana".into()),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        let profile = db
            .update_user_profile(
                "5491100000001",
                UserProfilePatch {
                    avatar: Some("/api/files/avatars/1_ana.png".into()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        assert_eq!(profile.name.as_deref(), Some("Ana"));

        let chat = db.fetch_chat("5491100000001").unwrap();
        assert_eq!(chat.avatar_url(), "/api/files/avatars/1_ana.png");
        assert_eq!(
            db.fetch_user_profile("5491100000001").unwrap(),
            Some(profile)
        );
    }
}
