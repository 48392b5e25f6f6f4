use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

const TICK: Duration = Duration::from_secs(1);

/// Counts whole seconds while a call is connected.
///
/// The count comes from ticks, not from subtracting wall-clock timestamps, so clock changes
/// on either end can't skew the reported duration.
pub struct DurationTimer {
    seconds: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl DurationTimer {
    pub fn start(publish: Arc<watch::Sender<u64>>) -> Self {
        let seconds = Arc::new(AtomicU64::new(0));
        publish.send_replace(0);

        let counter = seconds.clone();
        let task = tokio::spawn(async move {
            // First tick lands one full second after connect.
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            loop {
                ticker.tick().await;
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                publish.send_replace(n);
            }
        });

        Self {
            seconds,
            task: Some(task),
        }
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.seconds.load(Ordering::SeqCst)
    }

    /// Stops ticking and returns the final count. Idempotent.
    pub fn stop(&mut self) -> u64 {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.elapsed_secs()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for DurationTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> (Arc<watch::Sender<u64>>, watch::Receiver<u64>) {
        let (tx, rx) = watch::channel(0);
        (Arc::new(tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn counts_whole_seconds() {
        let (tx, rx) = publisher();
        let mut timer = DurationTimer::start(tx);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(timer.elapsed_secs(), 3);
        assert_eq!(*rx.borrow(), 3);

        assert_eq!(timer.stop(), 3);
        assert!(!timer.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(timer.elapsed_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_before_first_tick_reports_zero() {
        let (tx, _rx) = publisher();
        let mut timer = DurationTimer::start(tx);
        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(timer.stop(), 0);
        assert_eq!(timer.stop(), 0);
    }
}
