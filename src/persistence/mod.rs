//! Crash-safe file persistence shared by the queue, the idempotency tracker
//! and the credential lease.
//!
//! Every store in this crate keeps one small JSON snapshot and rewrites it in
//! full on each mutation. Writes go through [`save_json_atomic`], so a reader
//! (or a process restarting after a crash) sees either the previous snapshot
//! or the new one, never a torn file.
//!
//! # File Layout
//!
//! ```text
//! <state_dir>/
//!   queue.json          # pending webhook events, oldest first
//!   sent_invoices.json  # idempotency records keyed by invoice id
//!   token.json          # current credential lease
//! ```

pub mod atomic;
pub mod snapshot;

pub use atomic::{fsync_dir, fsync_file, write_atomic};
pub use snapshot::{
    SnapshotError, load_json, load_json_or_default, save_json_atomic, try_load_json,
};
