//! Sequential event processing.
//!
//! One [`Worker`] drains the durable queue in FIFO order, one event per
//! cycle, and paces itself to stay under the accounting platform's rate
//! ceiling.
//!
//! # Module Structure
//!
//! - [`processor`]: the per-event decision procedure
//! - [`pacing`]: cycle outcomes and the delay after each
//! - `worker`: the poll loop

pub mod pacing;
pub mod processor;
mod worker;


pub use pacing::{CycleOutcome, PacingConfig};
pub use processor::{Disposition, ProcessError, Processor, SkipReason};
pub use worker::Worker;
