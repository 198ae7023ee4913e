//! Core RoundStateUpdater struct and the awaiter-facing API.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::awaiter::{AwaiterRegistry, RoundAwaiter};
use crate::config::UpdaterConfig;
use crate::coordinator::CoordinatorVariant;
use crate::types::{RoundId, RoundKey, RoundState, RoundTable};

/// Externally visible lifecycle: Idle and Stopped both read as not running.
pub(crate) enum Lifecycle {
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

/// Keeps the latest state of every active round and wakes awaiters whose
/// condition becomes true.
pub struct RoundStateUpdater {
    /// Time between two coordinator polls.
    pub(crate) poll_interval: Duration,

    /// Coordinator backend.
    pub(crate) provider: Arc<CoordinatorVariant>,

    /// Latest round table, replaced wholesale by each successful tick.
    pub(crate) table: Arc<ArcSwap<RoundTable>>,

    /// Pending awaiters.
    pub(crate) registry: AwaiterRegistry,

    /// Halts the background loop and interrupts an in-flight fetch.
    pub(crate) shutdown: CancellationToken,

    /// Wakes the loop for an immediate tick.
    pub(crate) trigger: Arc<Notify>,

    pub(crate) lifecycle: Mutex<Lifecycle>,
}

impl RoundStateUpdater {
    /// Create a stopped updater; call `start` to begin polling.
    pub fn new(config: &UpdaterConfig, provider: CoordinatorVariant) -> Self {
        Self::with_interval(config.poll_interval(), provider)
    }

    pub fn with_interval(poll_interval: Duration, provider: CoordinatorVariant) -> Self {
        Self {
            poll_interval,
            provider: Arc::new(provider),
            table: Arc::new(ArcSwap::from_pointee(RoundTable::new())),
            registry: AwaiterRegistry::new(),
            shutdown: CancellationToken::new(),
            trigger: Arc::new(Notify::new()),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Wait until `round_id` reaches a state satisfying `predicate`.
    ///
    /// The predicate is only re-checked when the round's state changes, so a
    /// round that already satisfies it and then stays unchanged keeps the
    /// awaiter pending. Fails with `RoundNotRunning` if the round disappears.
    pub fn create_round_awaiter<P>(
        &self,
        round_id: RoundId,
        predicate: P,
        cancel: CancellationToken,
    ) -> RoundAwaiter
    where
        P: Fn(&RoundState) -> bool + Send + Sync + 'static,
    {
        self.registry.register(RoundKey::Round(round_id), predicate, cancel)
    }

    /// Wait until any active round satisfies `predicate`. Checked against
    /// every round on every tick.
    pub fn create_any_round_awaiter<P>(&self, predicate: P, cancel: CancellationToken) -> RoundAwaiter
    where
        P: Fn(&RoundState) -> bool + Send + Sync + 'static,
    {
        self.registry.register(RoundKey::AnyRound, predicate, cancel)
    }

    /// Snapshot of the latest round table.
    pub fn round_table(&self) -> Arc<RoundTable> {
        self.table.load_full()
    }

    pub fn pending_awaiters(&self) -> usize {
        self.registry.pending()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running(_))
    }

    /// Ask the background loop to tick now instead of waiting for the
    /// interval. Ignored unless the updater is running, so a call made
    /// before `start` or after `stop` never carries over into a later tick.
    pub fn trigger_tick(&self) {
        let lifecycle = self.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Running(_)) {
            self.trigger.notify_one();
        } else {
            debug!("ignoring tick trigger, updater is not running");
        }
    }
}
