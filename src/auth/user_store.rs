//! User Storage
//! Account lookup and password checks backing login

use crate::auth::models::Account;
use crate::db::Database;
use anyhow::{Context, Result};
use bcrypt::{hash, verify};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

/// Identity lookup boundary used by login
pub trait AccountDirectory: Send + Sync {
    fn lookup_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Returns the account only when `password` matches. Unknown email and
    /// wrong password both yield `Ok(None)` after the same amount of work.
    fn authenticate(&self, email: &str, password: &str) -> Result<Option<Account>>;
}

pub struct UserStore {
    db: Database,
    bcrypt_cost: u32,
    // Compared against when the email is unknown so both failure paths cost one bcrypt verify.
    dummy_hash: String,
}

impl UserStore {
    pub fn new(db: Database, bcrypt_cost: u32) -> Result<Self> {
        let dummy_hash =
            hash("microjournal-unknown-account", bcrypt_cost).context("Failed to hash password")?;
        Ok(Self {
            db,
            bcrypt_cost,
            dummy_hash,
        })
    }

    /// Create a new user
    pub fn create_user(
        &self,
        username: &str,
        display_name: &str,
        email: &str,
        password: &str,
    ) -> Result<Account> {
        let password_hash = hash(password, self.bcrypt_cost).context("Failed to hash password")?;

        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO users (username, display_name, email, password, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                username,
                display_name,
                email,
                password_hash,
                Utc::now().to_rfc3339()
            ],
        )
        .context("Failed to insert user")?;

        let account = Account {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
            password_hash,
        };

        info!("✅ Created user: {} ({})", account.username, account.id);
        Ok(account)
    }

    pub fn display_name(&self, user_id: i64) -> Result<Option<String>> {
        self.db
            .conn()
            .query_row(
                "SELECT display_name FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up display name")
    }

    pub fn user_exists(&self, user_id: i64) -> Result<bool> {
        let count: i64 = self
            .db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .context("Failed to look up user")?;
        Ok(count > 0)
    }
}

impl AccountDirectory for UserStore {
    fn lookup_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.db
            .conn()
            .query_row(
                "SELECT id, username, display_name, email, password
                 FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(Account {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        display_name: row.get(2)?,
                        email: row.get(3)?,
                        password_hash: row.get(4)?,
                    })
                },
            )
            .optional()
            .context("Failed to look up user by email")
    }

    fn authenticate(&self, email: &str, password: &str) -> Result<Option<Account>> {
        let Some(account) = self.lookup_by_email(email)? else {
            // Result is irrelevant; only the cost matters.
            let _ = verify(password, &self.dummy_hash);
            debug!("Login for unknown email");
            return Ok(None);
        };

        // A corrupt stored hash counts as a mismatch rather than a server error.
        let valid = verify(password, &account.password_hash).unwrap_or(false);
        if !valid {
            debug!(user_id = account.id, "Password mismatch");
            return Ok(None);
        }

        Ok(Some(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::is_unique_violation;

    fn create_test_store() -> UserStore {
        let db = Database::open_in_memory().unwrap();
        UserStore::new(db, 4).unwrap()
    }

    #[test]
    fn test_create_and_lookup_user() {
        let store = create_test_store();
        let created = store
            .create_user("ada", "Ada L", "a@x.com", "secret123")
            .unwrap();

        let found = store.lookup_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.username, "ada");
        assert_eq!(found.display_name, "Ada L");
        assert_ne!(found.password_hash, "secret123");

        assert!(store.lookup_by_email("nobody@x.com").unwrap().is_none());
    }

    #[test]
    fn test_authenticate() {
        let store = create_test_store();
        store
            .create_user("ada", "Ada", "a@x.com", "secret123")
            .unwrap();

        assert!(store.authenticate("a@x.com", "secret123").unwrap().is_some());
        assert!(store.authenticate("a@x.com", "wrong").unwrap().is_none());
        assert!(store
            .authenticate("nobody@x.com", "secret123")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_duplicate_email_is_unique_violation() {
        let store = create_test_store();
        store
            .create_user("ada", "Ada", "a@x.com", "secret123")
            .unwrap();

        let err = store
            .create_user("ada2", "Ada", "a@x.com", "secret123")
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_display_name_and_existence() {
        let store = create_test_store();
        let account = store
            .create_user("ada", "Ada L", "a@x.com", "secret123")
            .unwrap();

        assert_eq!(
            store.display_name(account.id).unwrap().as_deref(),
            Some("Ada L")
        );
        assert!(store.user_exists(account.id).unwrap());
        assert!(!store.user_exists(account.id + 100).unwrap());
        assert!(store.display_name(account.id + 100).unwrap().is_none());
    }
}
