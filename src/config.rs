//! Server configuration
//!
//! Every setting can come from a flag or the environment (`.env` is loaded
//! before parsing). Signing secrets have no defaults: starting without them is
//! a fatal error.

use crate::auth::SignerKeys;
use anyhow::{bail, Result};
use clap::Parser;
use std::net::SocketAddr;

#[derive(Parser, Clone)]
#[command(name = "microjournal")]
#[command(about = "Micro-journal API server")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8200")]
    pub bind: SocketAddr,

    /// Path to the SQLite database
    #[arg(long, env = "JOURNAL_DB_PATH", default_value = "microjournal.db")]
    pub db_path: String,

    /// HMAC secret for access tokens
    #[arg(long, env = "ACCESS_TOKEN_SECRET", hide_env_values = true)]
    pub access_secret: String,

    /// HMAC secret for refresh tokens; must differ from the access secret
    #[arg(long, env = "REFRESH_TOKEN_SECRET", hide_env_values = true)]
    pub refresh_secret: String,

    /// Issue a new refresh token (and revoke the old one) on every refresh
    #[arg(long, env = "ROTATE_REFRESH_TOKENS", default_value_t = false)]
    pub rotate_refresh_tokens: bool,

    /// bcrypt work factor for new password hashes
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Notification worker tasks
    #[arg(long, env = "NOTIFY_WORKERS", default_value_t = 2)]
    pub notify_workers: usize,

    /// Pending notification jobs before new ones are dropped
    #[arg(long, env = "NOTIFY_QUEUE_CAPACITY", default_value_t = 1024)]
    pub notify_queue: usize,

    /// Origin allowed by CORS
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:5000")]
    pub cors_origin: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("db_path", &self.db_path)
            .field("rotate_refresh_tokens", &self.rotate_refresh_tokens)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("notify_workers", &self.notify_workers)
            .field("notify_queue", &self.notify_queue)
            .field("cors_origin", &self.cors_origin)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Key material for the token signer
    pub fn signer_keys(&self) -> Result<SignerKeys> {
        if self.access_secret.trim().is_empty() || self.refresh_secret.trim().is_empty() {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must be set");
        }
        if self.access_secret == self.refresh_secret {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }

        Ok(SignerKeys {
            access: self.access_secret.as_bytes().to_vec(),
            refresh: self.refresh_secret.as_bytes().to_vec(),
        })
    }
}

/// Load `.env` from the working directory or its parents, if present
pub fn load_env() {
    let _ = dotenv::dotenv();
}
