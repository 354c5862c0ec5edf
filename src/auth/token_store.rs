//! Refresh Token Store
//! Durable record of every refresh credential this service issued and has not revoked

use crate::db::Database;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::params;
use tracing::{debug, info};

/// Store seam used by the session manager.
///
/// All lookups are exact string matches on the full token value.
pub trait RefreshTokenStore: Send + Sync {
    fn persist(&self, user_id: i64, token: &str, expires_at: i64) -> Result<()>;

    fn exists(&self, token: &str) -> Result<bool>;

    /// Delete the record; returns the number of rows removed (0 or 1)
    fn revoke(&self, token: &str) -> Result<usize>;
}

/// SQLite-backed token store
pub struct SqliteTokenStore {
    db: Database,
}

impl SqliteTokenStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Drop records whose expiry has passed; returns rows removed
    pub fn purge_expired(&self, now: i64) -> Result<usize> {
        let deleted = self
            .db
            .conn()
            .execute(
                "DELETE FROM refresh_tokens WHERE expires_at < ?1",
                params![now],
            )
            .context("Failed to purge expired refresh tokens")?;

        if deleted > 0 {
            info!("🧹 Purged {} expired refresh tokens", deleted);
        }
        Ok(deleted)
    }
}

impl RefreshTokenStore for SqliteTokenStore {
    fn persist(&self, user_id: i64, token: &str, expires_at: i64) -> Result<()> {
        self.db
            .conn()
            .execute(
                "INSERT INTO refresh_tokens (user_id, token, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, token, expires_at, Utc::now().timestamp()],
            )
            .context("Failed to save refresh token")?;

        debug!(user_id, expires_at, "Refresh token persisted");
        Ok(())
    }

    fn exists(&self, token: &str) -> Result<bool> {
        let count: i64 = self
            .db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM refresh_tokens WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .context("Failed to look up refresh token")?;
        Ok(count > 0)
    }

    fn revoke(&self, token: &str) -> Result<usize> {
        let rows_affected = self
            .db
            .conn()
            .execute(
                "DELETE FROM refresh_tokens WHERE token = ?1",
                params![token],
            )
            .context("Failed to revoke refresh token")?;
        Ok(rows_affected)
    }
}
