use std::{future::Future, time::Duration};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A unit of work that runs once after a delay unless it is cancelled first.
/// Dropping the task cancels it.
pub(crate) struct DelayedTask {
    cancellation_token: CancellationToken,
}

impl DelayedTask {
    pub(crate) fn run_after<F>(delay: Duration, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancellation_token = CancellationToken::new();
        let task_cancellation_token = cancellation_token.child_token();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_cancellation_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => work.await,
            }
        });

        Self { cancellation_token }
    }

    pub(crate) fn send_after<E>(delay: Duration, tx: mpsc::Sender<E>, event: E) -> Self
    where
        E: Send + 'static,
    {
        Self::run_after(delay, async move {
            let _ = tx.send(event).await;
        })
    }

    pub(crate) fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    #[cfg(test)]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sends_event_after_delay() {
        let (tx, mut rx) = mpsc::channel(1);
        let _task = DelayedTask::send_after(Duration::from_secs(5), tx, 42);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.try_recv().ok(), Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_task_never_fires() {
        let (tx, mut rx) = mpsc::channel(1);
        let task = DelayedTask::send_after(Duration::from_secs(5), tx, 42);

        drop(task);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_after_deadline_never_fires() {
        for _ in 0..32 {
            let (tx, mut rx) = mpsc::channel(1);
            let task = DelayedTask::send_after(Duration::ZERO, tx, 42);

            drop(task);
            tokio::time::sleep(Duration::from_secs(1)).await;

            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let (tx, mut rx) = mpsc::channel(1);
        let task = DelayedTask::send_after(Duration::from_secs(5), tx, 42);

        task.cancel();
        task.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(task.is_cancelled());
        assert!(rx.try_recv().is_err());
    }
}
