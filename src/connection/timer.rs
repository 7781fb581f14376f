use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A scheduled one-shot task that can be cancelled before it fires.
///
/// Dropping the handle detaches the task; only `cancel` stops it.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Run `task` after `delay` on the current runtime
    pub fn schedule<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self { task }
    }

    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
