//! At most one in-flight operation per key.
//!
//! A caller asking for a key that is already being fetched attaches to the
//! running operation and receives a clone of its result. The key is released
//! as soon as the operation completes (successfully or not), so the next call
//! starts a fresh group. There is no ordering between different keys.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::trace;

type InFlight<K, T> = Arc<Mutex<HashMap<K, Shared<BoxFuture<'static, T>>>>>;

/// A key → in-flight handle map.
pub struct SingleFlight<K, T> {
    inflight: InFlight<K, T>,
}

impl<K, T> Default for SingleFlight<K, T> {
    fn default() -> Self {
        SingleFlight {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, T> std::fmt::Debug for SingleFlight<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight").finish_non_exhaustive()
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work()` for `key`, or joins the run already in progress.
    ///
    /// `work` is only invoked when this call starts a new group.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(&key) {
                Some(existing) => {
                    trace!("Joining in-flight operation");
                    existing.clone()
                }
                None => {
                    let registry = Arc::clone(&self.inflight);
                    let release_key = key.clone();
                    let operation = work();
                    let shared = async move {
                        let output = operation.await;
                        registry.lock().await.remove(&release_key);
                        output
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key, shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    /// Returns the number of keys with an operation in progress.
    pub async fn in_flight(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
