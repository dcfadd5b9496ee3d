use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Owned handle of a periodic task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    shutdown: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancels the task and waits until its current run has returned.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Runs `task` immediately and then every `period` until the handle is cancelled.
///
/// Each run is awaited before the next tick is taken, so runs never overlap;
/// ticks missed while a run is in progress are skipped.
pub fn schedule<F, Fut>(name: &'static str, period: Duration, mut task: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let shutdown = CancellationToken::new();
    let stop = shutdown.clone();
    let join = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = task() => {}
            }
        }
        debug!(task = name, "scheduled task stopped");
    });
    TaskHandle {
        name,
        shutdown,
        join: Some(join),
    }
}
