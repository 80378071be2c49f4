//! Debounced autosave.
//!
//! [`Autosaver`] runs one background task per editor session. Every
//! [`touch`](Autosaver::touch) restarts the quiet-period timer; the save
//! callback only runs once no touch has arrived for the whole debounce
//! window. A save that has started always runs to completion; shutting
//! down only drops a timer that has not fired yet.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running autosave task.
pub struct Autosaver {
    touches: mpsc::UnboundedSender<()>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Autosaver {
    /// Spawn the autosave loop on the current tokio runtime.
    pub fn spawn<F, Fut>(debounce: Duration, save: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (touches, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(debounce, rx, cancel.clone(), save));
        Self {
            touches,
            cancel,
            task: Some(task),
        }
    }

    /// Record an edit, restarting the quiet period.
    pub fn touch(&self) {
        // Only fails after shutdown, when there is nothing left to save.
        let _ = self.touches.send(());
    }

    /// Drop any pending timer and wait for an in-progress save to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Autosave task panicked");
            }
        }
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        // The task detaches; a save already running still completes.
        self.cancel.cancel();
    }
}

async fn run<F, Fut>(
    debounce: Duration,
    mut touches: mpsc::UnboundedReceiver<()>,
    cancel: CancellationToken,
    save: F,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        // Idle: wait for the first edit of a burst.
        tokio::select! {
            _ = cancel.cancelled() => break,
            touch = touches.recv() => {
                if touch.is_none() {
                    break;
                }
            }
        }

        // Burst: restart the timer on every further edit.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Autosave cancelled with a pending timer");
                    return;
                }
                touch = touches.recv() => {
                    if touch.is_none() {
                        return;
                    }
                }
                _ = tokio::time::sleep(debounce) => break,
            }
        }

        save().await;
    }
    tracing::debug!("Autosave loop stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counting_saver(debounce: Duration) -> (Autosaver, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let saver = Autosaver::spawn(debounce, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (saver, count)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_touches_saves_once_after_quiet_period() {
        let (saver, count) = counting_saver(Duration::from_secs(2));

        for _ in 0..5 {
            saver.touch();
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        // 500ms after the last touch: still quiet.
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1_400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        saver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_save_separately() {
        let (saver, count) = counting_saver(Duration::from_secs(2));

        saver.touch();
        tokio::time::sleep(Duration::from_secs(3)).await;
        saver.touch();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        saver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_pending_timer() {
        let (saver, count) = counting_saver(Duration::from_secs(2));

        saver.touch();
        tokio::time::sleep(Duration::from_millis(100)).await;
        saver.shutdown().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
