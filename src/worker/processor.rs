//! The per-event decision procedure.
//!
//! Given the event at the head of the queue, decides whether the invoice it
//! points at needs a notification and performs at most one upstream side
//! effect. The local idempotency record is the only thing standing between a
//! redelivered "sent" observation and a second email, so it is always written
//! before the notification is dispatched: a crash in between leaves the
//! invoice looking notified, and it is never emailed twice.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::accounting::{AccountingApi, AccountingError, Invoice};
use crate::idempotency::IdempotencyTracker;
use crate::notify::{Attachment, Notification, Notifier, NotifyError, Recipients};
use crate::types::{EventCategory, EventType, InvoiceId, TenantId, WebhookEvent};

/// Errors that leave the event queued for another cycle.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The invoice could not be fetched.
    #[error("failed to fetch invoice: {0}")]
    Fetch(#[source] AccountingError),

    /// The notification was not delivered.
    #[error("failed to send notification: {0}")]
    Notify(#[from] NotifyError),
}

impl ProcessError {
    /// Returns true if the upstream signalled "too many requests".
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProcessError::Fetch(e) => e.is_rate_limited(),
            ProcessError::Notify(NotifyError::Rejected { status, .. }) => *status == 429,
            ProcessError::Notify(NotifyError::Http(_)) => false,
        }
    }
}

/// Why an event was dropped without looking at the invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Not an invoice create/update event.
    Unwatched,
    /// The resource URL has no usable id.
    MalformedResourceUri,
}

/// What processing an event amounted to. Every variant removes the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Skipped(SkipReason),

    /// The invoice was not yet flagged as sent upstream; asked the platform to
    /// flag it. `accepted` is false if that request failed.
    MarkRequested { accepted: bool },

    /// The invoice is not flagged as sent and has nobody to send to.
    NoRecipients,

    /// The invoice was flagged as sent and has already been notified.
    AlreadyNotified,

    /// The invoice was flagged as sent for the first time; the notification
    /// went out.
    Notified,

    /// The invoice was flagged as sent for the first time but has nobody to
    /// send to; recorded as notified.
    NotifiedNobody,
}

/// Runs the decision procedure against the accounting API and notifier.
pub struct Processor<A, N> {
    api: A,
    notifier: N,
    tracker: Arc<IdempotencyTracker>,
}

impl<A, N> std::fmt::Debug for Processor<A, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor").finish_non_exhaustive()
    }
}

impl<A: AccountingApi, N: Notifier> Processor<A, N> {
    pub fn new(api: A, notifier: N, tracker: Arc<IdempotencyTracker>) -> Self {
        Processor {
            api,
            notifier,
            tracker,
        }
    }

    pub fn tracker(&self) -> &IdempotencyTracker {
        &self.tracker
    }

    /// Processes one event.
    ///
    /// `Ok` means the event is finished with and can be removed; `Err` means
    /// it should stay queued.
    #[instrument(skip_all, fields(resource_id = %event.resource_id, tenant_id = %event.tenant_id))]
    pub async fn process(&self, event: &WebhookEvent) -> Result<Disposition, ProcessError> {
        if !is_watched(event) {
            debug!(
                category = %event.event_category,
                event_type = %event.event_type,
                "Skipping unwatched event"
            );
            return Ok(Disposition::Skipped(SkipReason::Unwatched));
        }

        let id = match event.entity_id() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Skipping event with malformed resource URL");
                return Ok(Disposition::Skipped(SkipReason::MalformedResourceUri));
            }
        };

        let invoice = self
            .api
            .get_invoice(&event.tenant_id, &id)
            .await
            .map_err(ProcessError::Fetch)?;

        if !invoice.sent_to_contact {
            return Ok(self.request_mark(&event.tenant_id, &id, &invoice).await);
        }

        if self.tracker.get_last_sent(&id).await {
            debug!(invoice_id = %id, "Invoice already notified");
            return Ok(Disposition::AlreadyNotified);
        }

        // Record before sending: a crash after this point never re-sends.
        // A send that fails observably clears the record so the retry sends.
        self.tracker.record_state(&id, true).await;

        let Some(recipients) = invoice.recipients() else {
            warn!(invoice_id = %id, "Invoice marked sent but contact has no email address");
            return Ok(Disposition::NotifiedNobody);
        };

        let notification = self
            .build_notification(&event.tenant_id, &id, &invoice, recipients)
            .await;
        if let Err(e) = self.notifier.send(&notification).await {
            self.tracker.record_state(&id, false).await;
            return Err(e.into());
        }

        info!(
            invoice_id = %id,
            invoice_number = %notification.invoice_number,
            to = ?notification.recipients.to,
            "Invoice notification sent"
        );
        Ok(Disposition::Notified)
    }

    async fn request_mark(
        &self,
        tenant: &TenantId,
        id: &InvoiceId,
        invoice: &Invoice,
    ) -> Disposition {
        self.tracker.record_state(id, false).await;

        if invoice.recipients().is_none() {
            warn!(invoice_id = %id, "Invoice contact has no email address; not marking as sent");
            return Disposition::NoRecipients;
        }

        match self.api.mark_as_sent(tenant, id).await {
            Ok(()) => {
                info!(invoice_id = %id, "Requested invoice be marked as sent");
                Disposition::MarkRequested { accepted: true }
            }
            Err(e) => {
                warn!(invoice_id = %id, error = %e, "Failed to mark invoice as sent");
                Disposition::MarkRequested { accepted: false }
            }
        }
    }

    /// Assembles the notification. Lookups of ancillary details never fail
    /// the send; a missing detail is logged and left out.
    async fn build_notification(
        &self,
        tenant: &TenantId,
        id: &InvoiceId,
        invoice: &Invoice,
        recipients: Recipients,
    ) -> Notification {
        let organisation_name = match self.api.get_organisation(tenant).await {
            Ok(org) => Some(org.name),
            Err(e) => {
                warn!(invoice_id = %id, error = %e, "Organisation lookup failed");
                None
            }
        };

        let invoice_number = invoice.display_number().to_string();

        let attachment = match self.api.get_invoice_pdf(tenant, id).await {
            Ok(content) => Some(Attachment {
                file_name: format!("{invoice_number}.pdf"),
                content_type: "application/pdf".to_string(),
                content,
            }),
            Err(e) => {
                warn!(invoice_id = %id, error = %e, "Invoice PDF unavailable");
                None
            }
        };

        let online_url = match self.api.get_online_invoice_url(tenant, id).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(invoice_id = %id, error = %e, "Online invoice link unavailable");
                None
            }
        };

        Notification {
            recipients,
            subject: Notification::subject_for(&invoice_number, organisation_name.as_deref()),
            invoice_number,
            organisation_name,
            amount_due: invoice.amount_due,
            currency: invoice.currency_code.clone(),
            online_url,
            attachment,
        }
    }
}

/// Invoice create and update events are the only ones acted on.
fn is_watched(event: &WebhookEvent) -> bool {
    event.event_category == EventCategory::Invoice
        && matches!(event.event_type, EventType::Create | EventType::Update)
}
