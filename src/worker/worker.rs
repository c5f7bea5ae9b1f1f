//! The single long-running worker loop.
//!
//! Each cycle is one step of a small state machine:
//!
//! ```text
//! Idle -> Peek -> Process -> {Success, RetriableFailure, RateLimited} -> Idle
//! ```
//!
//! [`Worker::tick`] performs exactly one cycle and reports its outcome;
//! [`Worker::run`] repeats it, sleeping for the delay [`PacingConfig`] assigns
//! to the outcome. Only the head of the queue is ever looked at, so side
//! effects are strictly serialized. Shutdown is cooperative: the token is
//! checked between cycles and during the sleep, never in the middle of one.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::pacing::{CycleOutcome, PacingConfig};
use super::processor::Processor;
use crate::accounting::AccountingApi;
use crate::notify::Notifier;
use crate::queue::DurableQueue;

/// Drains the durable queue one event at a time.
#[derive(Debug)]
pub struct Worker<A, N> {
    queue: Arc<DurableQueue>,
    processor: Processor<A, N>,
    pacing: PacingConfig,
}

impl<A: AccountingApi, N: Notifier> Worker<A, N> {
    pub fn new(queue: Arc<DurableQueue>, processor: Processor<A, N>, pacing: PacingConfig) -> Self {
        Worker {
            queue,
            processor,
            pacing,
        }
    }

    pub fn processor(&self) -> &Processor<A, N> {
        &self.processor
    }

    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    /// Runs one `Peek -> Process` cycle.
    pub async fn tick(&self) -> CycleOutcome {
        let event = match self.queue.peek().await {
            Ok(Some(event)) => event,
            Ok(None) => return CycleOutcome::Idle,
            Err(e) => {
                error!(error = %e, "Failed to read queue");
                return CycleOutcome::RetriableFailure;
            }
        };

        match self.processor.process(&event).await {
            Ok(disposition) => {
                debug!(resource_id = %event.resource_id, ?disposition, "Event processed");
                match self.queue.remove(&event).await {
                    Ok(true) => {}
                    Ok(false) => warn!(
                        resource_id = %event.resource_id,
                        "Processed event already gone from queue"
                    ),
                    Err(e) => error!(
                        resource_id = %event.resource_id,
                        error = %e,
                        "Failed to remove processed event"
                    ),
                }
                CycleOutcome::Success
            }
            Err(e) if e.is_rate_limited() => {
                warn!(resource_id = %event.resource_id, error = %e, "Rate limited, backing off");
                CycleOutcome::RateLimited
            }
            Err(e) => {
                error!(
                    resource_id = %event.resource_id,
                    error = %e,
                    "Processing failed, will retry"
                );
                CycleOutcome::RetriableFailure
            }
        }
    }

    /// Runs cycles until `shutdown` is cancelled.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Worker loop started");

        while !shutdown.is_cancelled() {
            let outcome = self.tick().await;
            let delay = self.pacing.delay_after(outcome);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Worker loop stopped");
    }
}
