// scheduler.rs
use std::{future::Future, time::Duration};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, warn};

/// Runs tagging work after a delay without holding a request worker.
///
/// On shutdown the pending delays are cut short and the work runs right
/// away, so a restart does not lose deliveries that were already
/// acknowledged.
#[derive(Debug, Clone, Default)]
pub struct DeferredTasks {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl DeferredTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, delay: Duration, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = shutdown.cancelled() => {
                    info!("Shutting down; running deferred tagging early");
                }
            }
            work.await;
        });
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Flushes every scheduled task and waits up to `timeout` for them.
    /// Returns how many were still running when the wait gave up.
    pub async fn drain(&self, timeout: Duration) -> usize {
        self.shutdown.cancel();
        self.tracker.close();

        let pending = self.tracker.len();
        if pending > 0 {
            info!("Waiting for {} deferred tagging task(s)", pending);
        }

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            let abandoned = self.tracker.len();
            warn!("Abandoning {} deferred tagging task(s) at shutdown", abandoned);
            return abandoned;
        }
        0
    }
}
