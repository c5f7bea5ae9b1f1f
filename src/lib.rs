//! Invoice notifier - receives accounting-platform webhooks and emails each
//! invoice to its customer once it has been marked as sent.
//!
//! Webhook events are verified and appended to a durable queue; a single
//! worker drains the queue one event at a time, consulting a local
//! idempotency record so no invoice is ever emailed twice.

pub mod accounting;
pub mod auth;
pub mod config;
pub mod idempotency;
pub mod notify;
pub mod persistence;
pub mod queue;
pub mod server;
pub mod types;
pub mod webhooks;
pub mod worker;

#[cfg(test)]
pub mod test_utils;
