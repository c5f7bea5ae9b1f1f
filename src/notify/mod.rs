//! Outbound invoice notifications.
//!
//! The processor hands a fully assembled [`Notification`] to a [`Notifier`];
//! delivery is the notifier's concern. [`Mailer`] picks the concrete
//! transport at startup: an HTTP mail relay when one is configured, or a
//! dry-run logger otherwise.

mod http;
mod log;

use std::fmt::Write as _;
use std::future::Future;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

pub use http::HttpMailer;
pub use log::LogNotifier;

/// Errors from delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The relay answered with a non-success status.
    #[error("mail relay rejected message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The relay could not be reached.
    #[error("mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for notification delivery.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Addresses a notification goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipients {
    pub to: Vec<String>,
    pub cc: Vec<String>,
}

/// A file attached to a notification.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Bytes,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.content.len())
            .finish()
    }
}

/// One invoice email, ready to hand to a transport.
///
/// Everything other than the recipients and subject is optional: missing
/// organisation details, links or documents make the message plainer but
/// never prevent it from being sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipients: Recipients,
    pub subject: String,
    pub invoice_number: String,
    pub organisation_name: Option<String>,
    pub amount_due: Option<f64>,
    pub currency: Option<String>,
    pub online_url: Option<String>,
    pub attachment: Option<Attachment>,
}

impl Notification {
    /// Builds the subject line for an invoice.
    pub fn subject_for(invoice_number: &str, organisation_name: Option<&str>) -> String {
        match organisation_name {
            Some(org) => format!("Invoice {invoice_number} from {org}"),
            None => format!("Invoice {invoice_number}"),
        }
    }

    /// Renders the plain-text body.
    pub fn text_body(&self) -> String {
        let mut body = String::from("Hello,\n\n");
        let _ = write!(body, "Please find invoice {}", self.invoice_number);
        if self.attachment.is_some() {
            body.push_str(" attached");
        }
        body.push_str(".\n");

        if let Some(amount) = self.amount_due {
            let currency = self.currency.as_deref().unwrap_or("");
            let _ = writeln!(body, "\nAmount due: {amount:.2} {currency}");
        }
        if let Some(url) = &self.online_url {
            let _ = writeln!(body, "\nView and pay online: {url}");
        }

        body.push_str("\nThank you,\n");
        if let Some(org) = &self.organisation_name {
            body.push_str(org);
            body.push('\n');
        }
        body
    }
}

/// Delivers notifications.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> impl Future<Output = Result<()>> + Send;
}

/// The transport selected from configuration.
#[derive(Debug, Clone)]
pub enum Mailer {
    Http(HttpMailer),
    DryRun(LogNotifier),
}

impl Notifier for Mailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        match self {
            Mailer::Http(mailer) => mailer.send(notification).await,
            Mailer::DryRun(logger) => logger.send(notification).await,
        }
    }
}
