//! Accounting platform API access.
//!
//! The worker only needs a handful of operations against the platform, which
//! are captured by the [`AccountingApi`] trait. [`XeroClient`] implements it
//! over HTTP:
//!
//! - Errors are classified into transient, rate-limited, unauthorized and
//!   permanent kinds so callers can decide whether to keep an event queued
//! - Rendered invoice documents are fetched at most once concurrently per
//!   invoice, with a short attempt loop that refreshes the credential after an
//!   authorization failure

mod attempt;
mod client;
mod error;
mod model;
mod single_flight;

use std::future::Future;

use bytes::Bytes;

pub use attempt::{AttemptConfig, with_attempts};
pub use client::{TENANT_HEADER, XeroClient};
pub use error::{AccountingError, AccountingErrorKind, Result};
pub use model::{Contact, ContactPerson, Invoice, Organisation};
pub use single_flight::SingleFlight;

use crate::types::{InvoiceId, TenantId};

/// The platform operations the processor depends on.
pub trait AccountingApi: Send + Sync {
    /// Fetches the current state of an invoice.
    fn get_invoice(
        &self,
        tenant: &TenantId,
        id: &InvoiceId,
    ) -> impl Future<Output = Result<Invoice>> + Send;

    /// Sets the platform's "sent to contact" flag on an invoice.
    fn mark_as_sent(
        &self,
        tenant: &TenantId,
        id: &InvoiceId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetches the tenant's organisation details.
    fn get_organisation(
        &self,
        tenant: &TenantId,
    ) -> impl Future<Output = Result<Organisation>> + Send;

    /// Fetches the rendered PDF of an invoice.
    fn get_invoice_pdf(
        &self,
        tenant: &TenantId,
        id: &InvoiceId,
    ) -> impl Future<Output = Result<Bytes>> + Send;

    /// Fetches the customer-facing link for an invoice.
    fn get_online_invoice_url(
        &self,
        tenant: &TenantId,
        id: &InvoiceId,
    ) -> impl Future<Output = Result<String>> + Send;
}
