//! Cancellable periodic task

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

/// Shortest accepted tick period; shorter ones (including zero) are raised to it
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Calls `on_tick` once per period until cancelled or until the callback breaks.
///
/// The first tick fires one full period after `start`. Dropping the task
/// cancels it. Must be started from within a tokio runtime.
pub struct CountdownTask {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CountdownTask {
    pub fn start<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let period = period.max(MIN_TICK_PERIOD);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            while flag.load(Ordering::SeqCst) {
                ticker.tick().await;

                if !flag.load(Ordering::SeqCst) {
                    break;
                }

                if on_tick().is_break() {
                    break;
                }
            }

            flag.store(false, Ordering::SeqCst);
            debug!("countdown loop stopped");
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the task; no tick fires after this returns
    pub fn cancel(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for CountdownTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::time::sleep;

    fn counter() -> (Arc<AtomicU32>, impl FnMut() -> ControlFlow<()> + Send + 'static) {
        let ticks = Arc::new(AtomicU32::new(0));
        let seen = ticks.clone();
        (ticks, move || {
            seen.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let (ticks, on_tick) = counter();
        let _task = CountdownTask::start(Duration::from_secs(1), on_tick);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(3)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (ticks, on_tick) = counter();
        let mut task = CountdownTask::start(Duration::from_secs(1), on_tick);

        sleep(Duration::from_millis(2500)).await;
        task.cancel();
        assert!(!task.is_running());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_task() {
        let ticks = Arc::new(AtomicU32::new(0));
        let seen = ticks.clone();
        let task = CountdownTask::start(Duration::from_secs(1), move || {
            if seen.fetch_add(1, Ordering::SeqCst) == 1 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(!task.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (ticks, on_tick) = counter();
        drop(CountdownTask::start(Duration::from_secs(1), on_tick));

        sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_clamped() {
        let (ticks, on_tick) = counter();
        let task = CountdownTask::start(Duration::ZERO, on_tick);

        sleep(Duration::from_millis(10)).await;
        assert!(task.is_running());
        assert!(ticks.load(Ordering::SeqCst) >= 5);
    }
}
