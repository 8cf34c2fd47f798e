//! Periodic-loop plumbing shared by the governor workers.
//!
//! Each worker runs on its own spawned task with its own interval; the two
//! loops never share a scheduler or a lock. Shutdown is a watch signal: a
//! tick already selected runs to completion, and `stop` resolves only after
//! the task has exited, so quiescence is deterministic.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to one running periodic loop.
pub(crate) struct LoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    /// Signal the loop and wait for it to finish its in-flight tick (if any)
    /// and exit.
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn a periodic loop invoking `tick` on the given interval. The first
/// tick runs immediately. Tick bodies are expected to contain their own
/// failures; nothing a tick does can terminate the loop.
pub(crate) fn spawn_periodic(
    interval: Duration,
    mut tick: impl FnMut() + Send + 'static,
) -> LoopHandle {
    let (shutdown, mut signal) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = signal.changed() => break,
                _ = ticker.tick() => tick(),
            }
        }
    });
    LoopHandle { shutdown, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_loop_ticks_and_stops() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = spawn_periodic(Duration::from_millis(10), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        handle.stop().await;
        let at_stop = count.load(Ordering::SeqCst);
        assert!(at_stop >= 2, "expected several ticks, got {}", at_stop);

        // No ticks after stop has returned.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), at_stop);
    }

    #[tokio::test]
    async fn test_first_tick_is_immediate() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = spawn_periodic(Duration::from_secs(3600), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        handle.stop().await;
    }
}
