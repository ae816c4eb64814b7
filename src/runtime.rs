//! Tokio-backed scheduler: one task per timer.

use std::time::Duration;
use tokio::runtime::Handle;

use crate::scheduler::{ExpiryCallback, Scheduler, TimerHandle};

/// Runs each expiry as its own task on a tokio runtime.
///
/// Cancelling aborts the task. A task already past its sleep and inside the
/// callback runs to completion; the store's generation check makes that
/// harmless.
///
/// ```
/// use expiring_store::{ExpiringStore, StoreConfig, TokioScheduler};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let scheduler = TokioScheduler::current().expect("inside a runtime");
/// let store: ExpiringStore<String> =
///     ExpiringStore::with_scheduler(StoreConfig::default(), Arc::new(scheduler));
/// store.set("session", "abc".to_string()).unwrap();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime this is called from, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, callback: ExpiryCallback) -> TimerHandle {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        TimerHandle::from_task(task.abort_handle())
    }
}
