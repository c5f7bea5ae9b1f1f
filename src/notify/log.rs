//! Dry-run notifier.

use tracing::info;

use super::{Notification, Notifier, Result};

/// Logs notifications instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            to = ?notification.recipients.to,
            cc = ?notification.recipients.cc,
            subject = %notification.subject,
            attachment = notification.attachment.is_some(),
            "Dry run: notification not sent"
        );
        Ok(())
    }
}
