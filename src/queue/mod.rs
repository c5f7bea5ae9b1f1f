//! Durable FIFO queue of pending webhook events.
//!
//! The queue is a single JSON file holding the ordered list of events, oldest
//! first. Every operation runs a full read-modify-write cycle under one
//! in-process lock, so concurrent callers (the webhook handler enqueueing,
//! the worker removing) observe a linear history and never lose an update.
//!
//! # Deduplication
//!
//! The platform may deliver the same notification more than once. Events are
//! identified by `(resourceId, eventDateUtc)`; enqueueing an event whose key is
//! already anywhere in the queue is a silent no-op.
//!
//! # Crash Safety
//!
//! - The file is replaced atomically (temp file + rename + fsync + dir fsync)
//! - A missing, empty or malformed file loads as an empty queue
//! - A failed write is logged and not reported to the caller; the logical
//!   update is lost if the process dies before the next successful write

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::persistence::{load_json_or_default, save_json_atomic};
use crate::types::WebhookEvent;

/// File name of the queue inside the state directory.
pub const QUEUE_FILE_NAME: &str = "queue.json";

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue file exists but could not be read.
    #[error("cannot read queue file: {0}")]
    Io(#[from] io::Error),
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// What [`DurableQueue::enqueue`] did with the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The event was appended to the tail.
    Queued,
    /// An event with the same key was already queued; nothing changed.
    Duplicate,
}

/// File-backed FIFO of [`WebhookEvent`]s.
#[derive(Debug)]
pub struct DurableQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DurableQueue {
    /// Creates a queue backed by `path`. The file is not touched until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DurableQueue {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Creates a queue at `<state_dir>/queue.json`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(QUEUE_FILE_NAME))
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `event` unless an event with the same key is already queued.
    pub async fn enqueue(&self, event: WebhookEvent) -> Result<EnqueueOutcome> {
        let _guard = self.lock.lock().await;
        let mut events = self.read()?;

        if events.iter().any(|queued| queued.same_key(&event)) {
            debug!(key = %event.key(), "Event already queued, ignoring");
            return Ok(EnqueueOutcome::Duplicate);
        }

        debug!(key = %event.key(), depth = events.len() + 1, "Queueing event");
        events.push(event);
        self.write(&events);
        Ok(EnqueueOutcome::Queued)
    }

    /// Returns every queued event, head first, without modifying the queue.
    pub async fn get_all(&self) -> Result<Vec<WebhookEvent>> {
        let _guard = self.lock.lock().await;
        self.read()
    }

    /// Returns the head of the queue, if any.
    pub async fn peek(&self) -> Result<Option<WebhookEvent>> {
        Ok(self.get_all().await?.into_iter().next())
    }

    /// Removes the first event whose key matches `event`.
    ///
    /// Returns whether an entry was removed; a missing event is not an error.
    pub async fn remove(&self, event: &WebhookEvent) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut events = self.read()?;

        let Some(index) = events.iter().position(|queued| queued.same_key(event)) else {
            return Ok(false);
        };

        events.remove(index);
        self.write(&events);
        Ok(true)
    }

    /// Returns the number of queued events.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.get_all().await?.len())
    }

    /// Returns true if nothing is queued.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    fn read(&self) -> Result<Vec<WebhookEvent>> {
        Ok(load_json_or_default(&self.path)?)
    }

    fn write(&self, events: &[WebhookEvent]) {
        if let Err(e) = save_json_atomic(&self.path, events) {
            error!(
                path = %self.path.display(),
                error = %e,
                "Failed to persist queue; update is held only until the next successful write"
            );
        }
    }
}
