//! Admission control for expensive background work.

use super::supervised::spawn_supervised;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default number of heavy tasks allowed to run at the same time.
pub const DEFAULT_HEAVY_CAPACITY: usize = 2;

/// Counting gate bounding how many heavy tasks (broadcasts, manual backups)
/// run concurrently.
///
/// Launching never blocks the caller: the task is started through the
/// supervisor and waits for a slot on its own. Waiting tasks are admitted in
/// FIFO order.
#[derive(Clone)]
pub struct HeavyTaskLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl HeavyTaskLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free slots right now.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Launch `work` as a supervised task that runs once a slot is free.
    ///
    /// The slot is released when `work` completes, including when it panics.
    pub fn run_heavy<F>(&self, name: impl Into<String>, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let semaphore = self.semaphore.clone();
        let task_name = name.clone();
        spawn_supervised(name, async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Heavy task {} dropped: limiter closed", task_name);
                    return;
                }
            };
            debug!("Heavy task {} admitted", task_name);
            work.await;
        })
    }
}

impl Default for HeavyTaskLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_HEAVY_CAPACITY)
    }
}
