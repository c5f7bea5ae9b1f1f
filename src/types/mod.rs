//! Core domain types for the invoice notifier.
//!
//! Newtype identifiers keep tenant, resource and invoice ids from being mixed
//! up, and [`WebhookEvent`] is the unit of work carried through the queue.

pub mod event;
pub mod ids;

pub use event::{EventCategory, EventKey, EventType, InvalidResourceUri, WebhookEvent};
pub use ids::{InvoiceId, ResourceId, TenantId};
