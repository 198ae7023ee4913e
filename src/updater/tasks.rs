//! Tick body and background task lifecycle.

use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, span, trace, warn, Instrument, Level};

use super::core::{Lifecycle, RoundStateUpdater};
use crate::awaiter::AwaiterRegistry;
use crate::coordinator::CoordinatorVariant;
use crate::error::UpdaterError;
use crate::reconciler::{reconcile, Reconciliation};
use crate::runner::PeriodicRunner;
use crate::traits::{PeriodicTask, RoundStatusProvider};
use crate::types::RoundTable;

/// Summary of one successful tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub rounds: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub resolved: usize,
    pub failed: usize,
}

/// One fetch-and-reconcile cycle.
///
/// A failed fetch returns the error untouched: the table and every awaiter
/// stay as they were, and the next tick simply tries again.
pub async fn tick_once<P>(
    provider: &P,
    table: &ArcSwap<RoundTable>,
    registry: &AwaiterRegistry,
    cancel: &CancellationToken,
) -> Result<TickReport>
where
    P: RoundStatusProvider + ?Sized,
{
    let fetched = provider
        .fetch_rounds(cancel)
        .await
        .with_context(|| format!("failed to fetch rounds from {}", provider.name()))?;

    let previous = table.load_full();
    let Reconciliation {
        table: next,
        changed,
        added,
        updated,
        removed,
    } = reconcile(&previous, fetched);

    let next = Arc::new(next);
    table.store(Arc::clone(&next));

    let outcome = registry.reconcile_tick(&next, &changed);

    let report = TickReport {
        rounds: next.len(),
        added,
        updated,
        removed,
        resolved: outcome.resolved,
        failed: outcome.failed,
    };

    if changed.is_empty() && outcome.resolved == 0 && outcome.failed == 0 {
        trace!(rounds = report.rounds, "round states unchanged");
    } else {
        debug!(
            rounds = report.rounds,
            added, updated, removed,
            resolved = report.resolved,
            failed = report.failed,
            "round states reconciled"
        );
    }

    Ok(report)
}

/// Periodic task polling the coordinator on behalf of the updater.
pub struct RoundUpdateTask {
    pub provider: Arc<CoordinatorVariant>,
    pub table: Arc<ArcSwap<RoundTable>>,
    pub registry: AwaiterRegistry,
}

#[async_trait]
impl PeriodicTask for RoundUpdateTask {
    fn name(&self) -> &'static str {
        "round_state_updater"
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<()> {
        let span = span!(Level::DEBUG, "tick", coordinator = self.provider.name());
        tick_once(self.provider.as_ref(), &self.table, &self.registry, cancel)
            .instrument(span)
            .await
            .map(|_| ())
    }
}

impl RoundStateUpdater {
    /// Spawn the polling loop. Calling it again while running is a no-op;
    /// an updater cannot be restarted once stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), UpdaterError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Stopped => return Err(UpdaterError::AlreadyStopped),
            Lifecycle::Idle => {}
        }

        info!(
            "Starting round state updater (coordinator={}, poll_interval={:?})",
            self.provider.name(),
            self.poll_interval
        );

        let task = RoundUpdateTask {
            provider: Arc::clone(&self.provider),
            table: Arc::clone(&self.table),
            registry: self.registry.clone(),
        };
        let runner = PeriodicRunner::new(
            self.poll_interval,
            self.shutdown.clone(),
            Arc::clone(&self.trigger),
        );

        let handle = tokio::spawn(
            async move { runner.run(&task).await }
                .instrument(span!(Level::INFO, "round_updater_task")),
        );
        *lifecycle = Lifecycle::Running(handle);
        Ok(())
    }

    /// Cancel every pending awaiter and halt the polling loop.
    ///
    /// Awaiters registered before this call end as `Canceled`; later ones
    /// resolve to `Stopped`. Waits for the loop to exit unless `cancel`
    /// fires first, in which case the loop task is aborted.
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<(), UpdaterError> {
        let canceled = self.registry.cancel_all();
        self.shutdown.cancel();

        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        info!("Stopping round state updater ({} awaiters canceled)", canceled);

        if let Lifecycle::Running(mut handle) = previous {
            tokio::select! {
                res = &mut handle => {
                    if let Err(e) = res {
                        if e.is_panic() {
                            return Err(UpdaterError::TaskPanicked);
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    warn!("Stop canceled, aborting round updater task");
                    handle.abort();
                }
            }
        }

        info!("Round state updater stopped");
        Ok(())
    }
}
