//! Cancellable one-shot and repeating background tasks.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest period a repeating task runs at; `tokio::time::interval`
/// rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A spawned timer task owned by a controller.
///
/// Cancelling only affects a task that is still waiting for its timer; work
/// that has already started runs to completion unless the task is aborted.
#[derive(Debug)]
pub(crate) struct ScheduledTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    delay: Duration,
}

impl ScheduledTask {
    /// Run `work` once after `delay`.
    pub(crate) fn once<Fut>(delay: Duration, work: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            work.await;
        });
        Self {
            cancel,
            handle,
            delay,
        }
    }

    /// Run `tick()` every `period`, first after one full period. Ticks never
    /// overlap; a slow tick delays the next one. A zero period is raised to
    /// [`MIN_PERIOD`].
    pub(crate) fn repeating<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {}
                }
                tick().await;
            }
        });
        Self {
            cancel,
            handle,
            delay: period,
        }
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the timer; in-flight work is left to finish.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the timer and abort in-flight work, waiting for the task to end.
    pub(crate) async fn shutdown(self) {
        self.cancel.cancel();
        self.handle.abort();
        let _ = self.handle.await;
    }
}

/// Holds at most one task of a kind; arming a new one cancels the previous.
#[derive(Debug, Default)]
pub(crate) struct TaskSlot {
    task: Mutex<Option<ScheduledTask>>,
}

impl TaskSlot {
    pub(crate) fn replace(&self, next: ScheduledTask) {
        let mut slot = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = slot.replace(next) {
            previous.cancel();
        }
    }

    pub(crate) fn take(&self) -> Option<ScheduledTask> {
        self.task.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    /// Delay of the armed task, if one is armed and has not finished.
    pub(crate) fn pending_delay(&self) -> Option<Duration> {
        let slot = self.task.lock().unwrap_or_else(|p| p.into_inner());
        slot.as_ref()
            .filter(|task| !task.is_finished())
            .map(ScheduledTask::delay)
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.pending_delay().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_once_runs_after_delay() {
        let hits = Arc::new(AtomicUsize::new(0));
        let task = {
            let hits = hits.clone();
            ScheduledTask::once(Duration::from_millis(30), async move {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(task.is_finished());
    }

    #[tokio::test]
    async fn test_cancelled_once_never_runs() {
        let hits = Arc::new(AtomicUsize::new(0));
        let task = {
            let hits = hits.clone();
            ScheduledTask::once(Duration::from_millis(50), async move {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        task.cancel();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeating_ticks_until_shutdown() {
        let hits = Arc::new(AtomicUsize::new(0));
        let task = {
            let hits = hits.clone();
            ScheduledTask::repeating(Duration::from_millis(40), move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(220)).await;
        task.shutdown().await;
        let seen = hits.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected at least two ticks, saw {}", seen);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_repeating_with_zero_period_keeps_ticking() {
        let hits = Arc::new(AtomicUsize::new(0));
        let task = {
            let hits = hits.clone();
            ScheduledTask::repeating(Duration::ZERO, move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        assert_eq!(task.delay(), MIN_PERIOD);
        assert!(hits.load(Ordering::SeqCst) >= 1);
        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_slot_replacement_cancels_previous() {
        let hits = Arc::new(AtomicUsize::new(0));
        let slot = TaskSlot::default();

        for delay_ms in [40u64, 60] {
            let hits = hits.clone();
            slot.replace(ScheduledTask::once(
                Duration::from_millis(delay_ms),
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                },
            ));
        }

        assert_eq!(slot.pending_delay(), Some(Duration::from_millis(60)));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!slot.is_armed());
    }
}
