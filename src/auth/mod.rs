//! Authentication Module
//! Session and token lifecycle: issue, verify, refresh and revoke credentials

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod session;
pub mod token_store;
pub mod user_store;

pub use api::AuthState;
pub use jwt::{SignerKeys, TokenSigner};
pub use middleware::auth_middleware;
pub use session::{SessionError, SessionManager};
pub use token_store::{RefreshTokenStore, SqliteTokenStore};
pub use user_store::{AccountDirectory, UserStore};
