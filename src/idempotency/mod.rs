//! Local record of which invoices have already had their notification sent.
//!
//! The accounting platform carries its own "sent to contact" flag on each
//! invoice. This tracker remembers the last value this service acted on, so
//! that observing the flag as `true` twice only fires the notification once.
//!
//! # Record Semantics
//!
//! - `record_state(id, false)` deletes the record: "not sent" and "untracked"
//!   mean the same thing.
//! - `record_state(id, true)` upserts `(sent = true, last_updated = now)`.
//! - Every mutation rewrites the whole map to disk before returning.
//!
//! # TTL-based Expiration
//!
//! Records older than the retention period (default 7 days) are pruned when
//! the tracker is loaded, regardless of their flag. There is no background
//! sweep; a long-running process keeps its records until the next restart.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::persistence::{load_json_or_default, save_json_atomic};
use crate::types::InvoiceId;

/// File name of the tracker inside the state directory.
pub const STATE_FILE_NAME: &str = "sent_invoices.json";

/// Default retention for idempotency records (7 days).
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Errors that can occur while loading the tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The state file exists but could not be read.
    #[error("cannot read idempotency state: {0}")]
    Io(#[from] io::Error),
}

/// What this service last believed about an invoice's notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub sent: bool,
    pub last_updated: DateTime<Utc>,
}

pub type Records = BTreeMap<InvoiceId, IdempotencyRecord>;

/// Process-wide idempotency state, loaded once at startup and shared by reference.
#[derive(Debug)]
pub struct IdempotencyTracker {
    path: PathBuf,
    records: Mutex<Records>,
}

impl IdempotencyTracker {
    /// Loads the tracker from `path`, pruning records older than `retention`
    /// and rewriting the pruned map.
    ///
    /// A missing, empty or malformed file starts an empty tracker.
    pub fn load(path: impl Into<PathBuf>, retention: Duration) -> Result<Self, TrackerError> {
        let path = path.into();
        let mut records: Records = load_json_or_default(&path)?;

        let pruned = prune_expired(&mut records, retention, Utc::now());
        info!(
            path = %path.display(),
            kept = records.len(),
            pruned,
            "Loaded idempotency records"
        );

        persist_records(&path, &records);
        Ok(IdempotencyTracker {
            path,
            records: Mutex::new(records),
        })
    }

    /// Loads `<state_dir>/sent_invoices.json` with the default retention.
    pub fn load_in_dir(state_dir: &Path) -> Result<Self, TrackerError> {
        Self::load(
            state_dir.join(STATE_FILE_NAME),
            Duration::days(DEFAULT_RETENTION_DAYS),
        )
    }

    /// Returns the last recorded flag for `id`, or `false` if untracked.
    pub async fn get_last_sent(&self, id: &InvoiceId) -> bool {
        self.records
            .lock()
            .await
            .get(id)
            .is_some_and(|record| record.sent)
    }

    /// Records the flag for `id` and persists the full map.
    pub async fn record_state(&self, id: &InvoiceId, sent: bool) {
        let mut records = self.records.lock().await;

        if sent {
            records.insert(
                id.clone(),
                IdempotencyRecord {
                    sent: true,
                    last_updated: Utc::now(),
                },
            );
        } else if records.remove(id).is_none() {
            debug!(invoice_id = %id, "Invoice already untracked");
        }

        persist_records(&self.path, &records);
    }

    /// Returns the full record for `id`, if tracked.
    pub async fn record(&self, id: &InvoiceId) -> Option<IdempotencyRecord> {
        self.records.lock().await.get(id).copied()
    }

    /// Returns the number of tracked invoices.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Returns true if no invoice is tracked.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn persist_records(path: &Path, records: &Records) {
    if let Err(e) = save_json_atomic(path, records) {
        error!(
            path = %path.display(),
            error = %e,
            "Failed to persist idempotency records"
        );
    }
}

/// Drops records older than `retention` and records whose flag is `false`.
///
/// Returns the number of records removed.
pub fn prune_expired(records: &mut Records, retention: Duration, now: DateTime<Utc>) -> usize {
    let cutoff = now - retention;
    let before_len = records.len();
    records.retain(|_, record| record.sent && record.last_updated > cutoff);
    before_len - records.len()
}
