//! Interval task plumbing shared by every engine loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::context::AppContext;

/// Handle to one running loop; dropping it detaches the loop, [`stop`]
/// shuts it down and waits for the current tick to finish.
///
/// [`stop`]: TaskHandle::stop
pub struct TaskHandle {
    name: &'static str,
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub async fn stop(self) {
        // notify_one stores a permit, so the signal survives a race with
        // the loop still inside a tick
        self.shutdown.notify_one();
        if self.join.await.is_err() {
            warn!(task = self.name, "loop task panicked");
        }
    }
}

/// Spawn a strictly serial interval loop: first tick after `initial_delay`,
/// then one tick per `interval`, measured from tick end. A tick error is
/// logged and the loop keeps going.
pub fn spawn_interval<F, Fut>(
    name: &'static str,
    initial_delay: Duration,
    interval: Duration,
    ctx: Arc<AppContext>,
    handler: F,
) -> TaskHandle
where
    F: Fn(Arc<AppContext>) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let shutdown = Arc::new(Notify::new());
    let shutdown2 = shutdown.clone();
    let join = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(initial_delay) => {}
            _ = shutdown2.notified() => {
                debug!(task = name, "stopped before first tick");
                return;
            }
        }
        loop {
            if let Err(err) = handler(ctx.clone()).await {
                warn!(task = name, error = %err, "tick failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown2.notified() => {
                    debug!(task = name, "stopped");
                    return;
                }
            }
        }
    });
    TaskHandle { name, shutdown, join }
}
