//! Micro-journal API server
//! Wires configuration, storage, the session manager and the notification workers

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::interval};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use microjournal_backend::{
    app::{build_router, cors_layer},
    auth::{SessionManager, SqliteTokenStore, TokenSigner, UserStore},
    clock::{Clock, SystemClock},
    config::{load_env, Config},
    db::Database,
    journal::{JournalState, JournalStore},
    notify::{LogPushGateway, NotificationDispatcher, NotificationService},
};

const TOKEN_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::parse();
    info!(?config, "🚀 Micro-journal backend starting");

    // Missing or shared signing secrets stop startup here.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let signer = Arc::new(
        TokenSigner::new(config.signer_keys()?, clock.clone())
            .context("Failed to initialize token signer")?,
    );

    let db = Database::open(&config.db_path)?;
    let users = Arc::new(UserStore::new(db.clone(), config.bcrypt_cost)?);
    let tokens = Arc::new(SqliteTokenStore::new(db.clone()));
    let journal = Arc::new(JournalStore::new(db));

    let sessions = Arc::new(
        SessionManager::new(signer, users.clone(), tokens.clone())
            .with_refresh_rotation(config.rotate_refresh_tokens),
    );
    info!(
        rotate_refresh_tokens = config.rotate_refresh_tokens,
        "🔐 Session manager initialized"
    );

    let (notifier, notify_rx) = NotificationDispatcher::channel(config.notify_queue);
    NotificationService::new(users.clone(), journal.clone(), Arc::new(LogPushGateway))
        .spawn_workers(notify_rx, config.notify_workers);

    tokio::spawn(purge_expired_tokens(tokens));

    let app = build_router(
        sessions,
        JournalState {
            users,
            journal,
            notifier,
            clock,
        },
        cors_layer(&config.cors_origin)?,
    );

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("🎯 API server listening on {}", config.bind);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Periodically drop refresh token records that can no longer verify
async fn purge_expired_tokens(tokens: Arc<SqliteTokenStore>) {
    let mut ticker = interval(TOKEN_PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        if let Err(e) = tokens.purge_expired(Utc::now().timestamp()) {
            error!(error = %e, "Refresh token purge failed");
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "microjournal_backend=debug,microjournal=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
