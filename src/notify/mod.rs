//! Notification Module
//! Asynchronous push fan-out, decoupled from the write paths that trigger it

pub mod dispatcher;
pub mod gateway;

pub use dispatcher::{NewPostNotification, NotificationDispatcher, NotificationService};
pub use gateway::{LogPushGateway, MulticastReport, PushGateway, PushMessage};
