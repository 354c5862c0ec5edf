//! Push Gateway boundary
//! Delivery to device tokens is owned by an external service; this is its seam.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

/// Per-recipient outcome counts of a multicast send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MulticastReport {
    pub success_count: usize,
    pub failure_count: usize,
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, device_token: &str, message: &PushMessage) -> Result<()>;

    async fn send_multicast(
        &self,
        device_tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport>;
}

/// Gateway that only records deliveries in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPushGateway;

#[async_trait]
impl PushGateway for LogPushGateway {
    async fn send(&self, _device_token: &str, message: &PushMessage) -> Result<()> {
        info!(title = %message.title, "📨 Push notification sent");
        Ok(())
    }

    async fn send_multicast(
        &self,
        device_tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport> {
        info!(
            title = %message.title,
            recipients = device_tokens.len(),
            "📨 Push multicast sent"
        );
        Ok(MulticastReport {
            success_count: device_tokens.len(),
            failure_count: 0,
        })
    }
}
