//! Alert delivery
//!
//! Notifications are fire-and-forget from the pipeline's point of view:
//! a failed send is logged by the caller and never retried.

pub mod format;
pub mod telegram;

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

pub use format::format_alert;
pub use telegram::TelegramNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_alert(&self, message: &str) -> Result<()>;
}

/// Writes alerts to the log instead of a channel (dry runs, missing credentials)
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_alert(&self, message: &str) -> Result<()> {
        info!(target: "pumpfun_sentinel::alert", "{}", message);
        Ok(())
    }
}
