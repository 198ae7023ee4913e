//! Fixed-interval invoker, kept apart from any tick business logic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, span, warn, Instrument, Level};

use crate::traits::PeriodicTask;

/// Collapses repeated identical tick failures into one warning.
#[derive(Debug)]
pub struct FailureTracker {
    task: &'static str,
    last: Option<String>,
    repeats: u64,
}

impl FailureTracker {
    pub fn new(task: &'static str) -> Self {
        Self {
            task,
            last: None,
            repeats: 0,
        }
    }

    /// Record a failed tick. Returns true when the failure was new and
    /// logged at warn level.
    pub fn record_failure(&mut self, err: &anyhow::Error) -> bool {
        let message = format!("{:#}", err);
        if self.last.as_deref() == Some(message.as_str()) {
            self.repeats += 1;
            debug!(task = self.task, repeats = self.repeats, "tick failed again: {}", message);
            return false;
        }

        warn!(task = self.task, "tick failed: {}", message);
        self.last = Some(message);
        self.repeats = 1;
        true
    }

    /// Record a successful tick, logging recovery after a failure streak.
    pub fn record_success(&mut self) {
        if self.last.take().is_some() {
            info!(task = self.task, failed_ticks = self.repeats, "tick recovered");
            self.repeats = 0;
        }
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.repeats
    }
}

/// Calls a `PeriodicTask` every `period` until `shutdown` fires.
///
/// Ticks run back to back on one task and never overlap. A `trigger` can
/// request an immediate tick, which also restarts the interval.
pub struct PeriodicRunner {
    period: Duration,
    shutdown: CancellationToken,
    trigger: Arc<Notify>,
}

impl PeriodicRunner {
    pub fn new(period: Duration, shutdown: CancellationToken, trigger: Arc<Notify>) -> Self {
        Self {
            period,
            shutdown,
            trigger,
        }
    }

    pub async fn run<T>(&self, task: &T)
    where
        T: PeriodicTask + ?Sized,
    {
        let span = span!(Level::INFO, "periodic_runner", task = task.name());
        self.run_loop(task).instrument(span).await
    }

    async fn run_loop<T>(&self, task: &T)
    where
        T: PeriodicTask + ?Sized,
    {
        info!("Periodic runner started (period={:?})", self.period);

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut failures = FailureTracker::new(task.name());

        loop {
            let triggered = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => false,
                _ = self.trigger.notified() => true,
            };
            if triggered {
                interval.reset();
            }

            match task.tick(&self.shutdown).await {
                Ok(()) => failures.record_success(),
                Err(_) if self.shutdown.is_cancelled() => {
                    debug!("tick interrupted by shutdown");
                    break;
                }
                Err(e) => {
                    failures.record_failure(&e);
                }
            }
        }

        info!("Periodic runner stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use super::*;

    struct CountingTask {
        ticks: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PeriodicTask for CountingTask {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn tick(&self, _cancel: &CancellationToken) -> Result<()> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("boom");
            }
            Ok(())
        }
    }

    #[test]
    fn test_failure_tracker_dedupes() {
        let mut tracker = FailureTracker::new("test");
        let err = anyhow::anyhow!("coordinator unreachable");

        assert!(tracker.record_failure(&err));
        assert!(!tracker.record_failure(&err));
        assert_eq!(tracker.consecutive_failures(), 2);

        assert!(tracker.record_failure(&anyhow::anyhow!("other")));
        tracker.record_success();
        assert_eq!(tracker.consecutive_failures(), 0);
        assert!(tracker.record_failure(&err));
    }

    #[tokio::test]
    async fn test_runner_keeps_ticking_on_errors() {
        let task = Arc::new(CountingTask {
            ticks: AtomicUsize::new(0),
            fail: true,
        });
        let shutdown = CancellationToken::new();
        let runner = PeriodicRunner::new(Duration::from_millis(5), shutdown.clone(), Arc::new(Notify::new()));

        let handle = {
            let task = Arc::clone(&task);
            tokio::spawn(async move { runner.run(task.as_ref()).await })
        };

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(task.ticks.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_trigger_runs_tick_early() {
        let task = Arc::new(CountingTask {
            ticks: AtomicUsize::new(0),
            fail: false,
        });
        let shutdown = CancellationToken::new();
        let trigger = Arc::new(Notify::new());
        let runner = PeriodicRunner::new(Duration::from_secs(3600), shutdown.clone(), Arc::clone(&trigger));

        let handle = {
            let task = Arc::clone(&task);
            tokio::spawn(async move { runner.run(task.as_ref()).await })
        };

        // The first tick fires right away.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(task.ticks.load(Ordering::SeqCst), 1);

        trigger.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(task.ticks.load(Ordering::SeqCst), 2);

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(task.ticks.load(Ordering::SeqCst), 2);
    }
}
