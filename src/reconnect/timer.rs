use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Owned, cancelable one-shot timer.
///
/// After `delay` the timer delivers `message` on the given channel. Calling
/// [`ScheduledTask::cancel`] or dropping the value aborts it, so a holder
/// that replaces or discards its timer can never be woken by the old one.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn schedule<M>(delay: Duration, tx: mpsc::UnboundedSender<M>, message: M) -> Self
    where
        M: Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message);
        });
        Self { handle }
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
