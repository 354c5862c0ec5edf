//! Journal storage: posts, buddy links and push device tokens

use crate::db::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::params;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub template_id: i64,
    pub text: String,
    pub photo_path: Option<String>,
    pub created_at: String,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct JournalStore {
    db: Database,
}

impl JournalStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Link `user_id` to `buddy_id`; returns false if the link already existed
    pub fn add_buddy(&self, user_id: i64, buddy_id: i64) -> Result<bool> {
        let inserted = self
            .db
            .conn()
            .execute(
                "INSERT OR IGNORE INTO buddies (user_id, buddy_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![user_id, buddy_id, timestamp(Utc::now())],
            )
            .context("Failed to add buddy")?;
        Ok(inserted > 0)
    }

    pub fn register_device_token(&self, user_id: i64, token: &str) -> Result<()> {
        let now = timestamp(Utc::now());
        self.db
            .conn()
            .execute(
                "INSERT INTO fcm_tokens (user_id, token, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (user_id, token) DO UPDATE SET updated_at = excluded.updated_at",
                params![user_id, token, now],
            )
            .context("Failed to register device token")?;
        Ok(())
    }

    /// Distinct device tokens of everyone `user_id` has linked as a buddy
    pub fn buddy_device_tokens(&self, user_id: i64) -> Result<Vec<String>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT ft.token
             FROM buddies b
             JOIN fcm_tokens ft ON b.buddy_id = ft.user_id
             WHERE b.user_id = ?1 AND ft.token != ''",
        )?;

        let tokens = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to fetch buddy device tokens")?;
        Ok(tokens)
    }

    /// Insert the user's post for the UTC day of `now`.
    ///
    /// Returns `None` when a post already exists for that day. The check and
    /// the insert are one statement.
    pub fn create_post(
        &self,
        user_id: i64,
        template_id: i64,
        text: &str,
        photo_path: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Post>> {
        let start_of_day = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .context("Invalid day boundary")?
            .and_utc();
        let end_of_day = start_of_day + Duration::days(1);
        let created_at = timestamp(now);

        let conn = self.db.conn();
        let inserted = conn
            .execute(
                "INSERT INTO posts (user_id, template_id, text, photo_path, created_at)
                 SELECT ?1, ?2, ?3, ?4, ?5
                 WHERE NOT EXISTS (
                     SELECT 1 FROM posts
                     WHERE user_id = ?1 AND created_at >= ?6 AND created_at < ?7
                 )",
                params![
                    user_id,
                    template_id,
                    text,
                    photo_path,
                    created_at,
                    timestamp(start_of_day),
                    timestamp(end_of_day),
                ],
            )
            .context("Failed to create post")?;

        if inserted == 0 {
            return Ok(None);
        }

        Ok(Some(Post {
            id: conn.last_insert_rowid(),
            user_id,
            template_id,
            text: text.to_string(),
            photo_path: photo_path.map(str::to_string),
            created_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn create_test_store() -> (JournalStore, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for name in ["ada", "bob"] {
            db.conn()
                .execute(
                    "INSERT INTO users (username, display_name, email, password, created_at)
                     VALUES (?1, ?1, ?1 || '@x.com', 'hash', 'now')",
                    params![name],
                )
                .unwrap();
            ids.push(db.conn().last_insert_rowid());
        }
        (JournalStore::new(db), ids[0], ids[1])
    }

    #[test]
    fn test_one_post_per_utc_day() {
        let (store, ada, _) = create_test_store();
        let morning = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();

        let post = store
            .create_post(ada, 1, "first", None, morning)
            .unwrap()
            .unwrap();
        assert_eq!(post.created_at, "2025-05-01T08:00:00Z");

        let evening = Utc.with_ymd_and_hms(2025, 5, 1, 23, 59, 59).unwrap();
        assert!(store
            .create_post(ada, 1, "second", None, evening)
            .unwrap()
            .is_none());

        let next_day = Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap();
        assert!(store
            .create_post(ada, 1, "next", Some("p.jpg"), next_day)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_buddy_links_are_idempotent() {
        let (store, ada, bob) = create_test_store();
        assert!(store.add_buddy(ada, bob).unwrap());
        assert!(!store.add_buddy(ada, bob).unwrap());
    }

    #[test]
    fn test_buddy_device_tokens_are_distinct() {
        let (store, ada, bob) = create_test_store();
        store.add_buddy(ada, bob).unwrap();
        store.register_device_token(bob, "device-1").unwrap();
        store.register_device_token(bob, "device-1").unwrap();

        assert_eq!(
            store.buddy_device_tokens(ada).unwrap(),
            vec!["device-1".to_string()]
        );
        // Links are directional.
        assert!(store.buddy_device_tokens(bob).unwrap().is_empty());
    }
}
