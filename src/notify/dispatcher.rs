//! Buddy notification fan-out.
//!
//! Write paths enqueue a job and move on; worker tasks drain the queue and
//! talk to the push gateway. Delivery outcome never reaches the request that
//! triggered it.

use crate::auth::user_store::UserStore;
use crate::journal::store::JournalStore;
use crate::notify::gateway::{MulticastReport, PushGateway, PushMessage};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const BODY_LIMIT: usize = 100;
const FALLBACK_NAME: &str = "A friend";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPostNotification {
    pub author_id: i64,
    pub text: String,
}

/// Producer half handed to request handlers
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<NewPostNotification>,
}

impl NotificationDispatcher {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NewPostNotification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a job without waiting; returns false if it was dropped
    pub fn enqueue(&self, job: NewPostNotification) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(author_id = job.author_id, "Notification queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(author_id = job.author_id, "Notification queue closed, dropping job");
                false
            }
        }
    }
}

/// Consumer side: resolves recipients and sends through the gateway
#[derive(Clone)]
pub struct NotificationService {
    users: Arc<UserStore>,
    journal: Arc<JournalStore>,
    gateway: Arc<dyn PushGateway>,
}

impl NotificationService {
    pub fn new(
        users: Arc<UserStore>,
        journal: Arc<JournalStore>,
        gateway: Arc<dyn PushGateway>,
    ) -> Self {
        Self {
            users,
            journal,
            gateway,
        }
    }

    pub fn spawn_workers(
        self,
        rx: mpsc::Receiver<NewPostNotification>,
        worker_count: usize,
    ) -> Vec<JoinHandle<()>> {
        let shared_rx = Arc::new(Mutex::new(rx));
        let workers = worker_count.max(1);

        (0..workers)
            .map(|i| {
                let svc = self.clone();
                let rx = shared_rx.clone();
                tokio::spawn(async move {
                    loop {
                        let job_opt = { rx.lock().await.recv().await };
                        let Some(job) = job_opt else {
                            break;
                        };
                        if let Err(e) = svc.process_job(job).await {
                            warn!(worker = i, error = %e, "Notification job failed");
                        }
                    }
                })
            })
            .collect()
    }

    /// Returns `None` when the author has no reachable buddies
    pub async fn process_job(&self, job: NewPostNotification) -> Result<Option<MulticastReport>> {
        let display_name = match self.users.display_name(job.author_id) {
            Ok(Some(name)) => name,
            Ok(None) => FALLBACK_NAME.to_string(),
            Err(e) => {
                warn!(error = %e, "Could not fetch display name for notification");
                FALLBACK_NAME.to_string()
            }
        };

        let tokens = self.journal.buddy_device_tokens(job.author_id)?;
        if tokens.is_empty() {
            info!(author_id = job.author_id, "No device tokens for buddies");
            return Ok(None);
        }

        let message = new_post_message(&display_name, job.author_id, &job.text);
        let report = self.gateway.send_multicast(&tokens, &message).await?;

        info!(
            author_id = job.author_id,
            success = report.success_count,
            failure = report.failure_count,
            "Sent new-post notifications"
        );
        Ok(Some(report))
    }
}

pub fn new_post_message(display_name: &str, author_id: i64, text: &str) -> PushMessage {
    let data = HashMap::from([
        ("type".to_string(), "new_post".to_string()),
        ("user_id".to_string(), author_id.to_string()),
    ]);

    PushMessage {
        title: format!("{} posted today!", display_name),
        body: truncate_body(text),
        data,
    }
}

fn truncate_body(text: &str) -> String {
    if text.chars().count() <= BODY_LIMIT {
        return text.to_string();
    }
    let mut body: String = text.chars().take(BODY_LIMIT - 3).collect();
    body.push_str("...");
    body
}
