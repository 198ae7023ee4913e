use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace, warn};

use super::round_awaiter::RoundAwaiter;
use super::{AwaitOutcome, RoundPredicate};
use crate::error::RoundAwaitError;
use crate::types::{RoundId, RoundKey, RoundState, RoundTable};

/// One pending registration.
struct Waiter {
    id: u64,
    predicate: RoundPredicate,
    tx: oneshot::Sender<AwaitOutcome>,
    /// Cancels the settled token when the waiter leaves the registry, which
    /// releases its cancellation watcher.
    _settled: DropGuard,
}

impl Waiter {
    fn finish(self, outcome: AwaitOutcome) {
        // The receiver may already be gone; nothing left to notify then.
        let _ = self.tx.send(outcome);
    }
}

#[derive(Default)]
pub(crate) struct RegistryState {
    buckets: HashMap<RoundKey, Vec<Waiter>>,
    next_id: u64,
    closed: bool,
}

impl RegistryState {
    /// Remove a single waiter, dropping its bucket when it becomes empty.
    fn take(&mut self, key: RoundKey, id: u64) -> Option<Waiter> {
        let bucket = self.buckets.get_mut(&key)?;
        let pos = bucket.iter().position(|w| w.id == id)?;
        let waiter = bucket.remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(&key);
        }
        Some(waiter)
    }

    fn drain(&mut self) -> impl Iterator<Item = Waiter> + '_ {
        self.buckets.drain().flat_map(|(_, bucket)| bucket)
    }
}

/// Remove a waiter on behalf of its awaiter. Returns false when a tick,
/// shutdown or registry drop already took it.
pub(crate) fn remove_waiter(registry: &Weak<Mutex<RegistryState>>, key: RoundKey, id: u64) -> bool {
    match registry.upgrade() {
        Some(inner) => inner.lock().take(key, id).is_some(),
        None => false,
    }
}

/// Counts of waiters settled by one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub resolved: usize,
    pub failed: usize,
}

/// Thread-safe store of pending round awaiters.
///
/// Every bucket mutation happens under a single lock, so a waiter is removed
/// exactly once no matter whether a tick, a cancellation or shutdown reaches
/// it first.
#[derive(Clone, Default)]
pub struct AwaiterRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl AwaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a waiter to the bucket of `key` and hand back its future.
    ///
    /// Never blocks on anything but the registry lock. A closed registry
    /// yields an awaiter that resolves to `RoundAwaitError::Stopped`, an
    /// already cancelled token one that resolves to `Canceled`; neither is
    /// stored.
    ///
    /// Inside a tokio runtime a watcher task removes the waiter as soon as
    /// `cancel` fires, whether or not the awaiter is being polled. Outside a
    /// runtime the awaiter notices the cancellation on its next poll.
    pub fn register<P>(&self, key: RoundKey, predicate: P, cancel: CancellationToken) -> RoundAwaiter
    where
        P: Fn(&RoundState) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let mut state = self.inner.lock();
        if state.closed {
            drop(state);
            let _ = tx.send(Err(RoundAwaitError::Stopped));
            debug!(%key, "rejected round awaiter, registry is closed");
            return RoundAwaiter::new(key, 0, rx, cancel, Weak::new());
        }
        if cancel.is_cancelled() {
            drop(state);
            let _ = tx.send(Err(RoundAwaitError::Canceled));
            debug!(%key, "round awaiter canceled before registration");
            return RoundAwaiter::new(key, 0, rx, cancel, Weak::new());
        }

        let id = state.next_id;
        state.next_id += 1;
        let settled = CancellationToken::new();
        state.buckets.entry(key).or_default().push(Waiter {
            id,
            predicate: Box::new(predicate),
            tx,
            _settled: settled.clone().drop_guard(),
        });
        drop(state);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let registry = Arc::downgrade(&self.inner);
            let cancel = cancel.clone();
            handle.spawn(watch_cancellation(registry, key, id, cancel, settled));
        }

        debug!(%key, waiter_id = id, "registered round awaiter");
        RoundAwaiter::new(key, id, rx, cancel, Arc::downgrade(&self.inner))
    }

    /// Settle waiters against a freshly reconciled table.
    ///
    /// The wildcard bucket is checked against every round in `table`. Round
    /// buckets are only visited when their id is in `changed`: a vanished
    /// round fails all of its waiters, a present one is re-evaluated. Waiters
    /// on rounds that did not change stay pending even if their predicate
    /// already holds.
    pub fn reconcile_tick(&self, table: &RoundTable, changed: &HashSet<RoundId>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let mut state = self.inner.lock();

        if let Some(bucket) = state.buckets.get_mut(&RoundKey::AnyRound) {
            for round in table.values() {
                if bucket.is_empty() {
                    break;
                }
                settle_bucket(bucket, RoundKey::AnyRound, round, &mut outcome);
            }
        }

        for id in changed {
            let key = RoundKey::Round(*id);
            match table.get(id) {
                None => {
                    if let Some(bucket) = state.buckets.remove(&key) {
                        debug!(round = %id, waiters = bucket.len(), "round vanished, failing awaiters");
                        for waiter in bucket {
                            waiter.finish(Err(RoundAwaitError::RoundNotRunning(*id)));
                            outcome.failed += 1;
                        }
                    }
                }
                Some(round) => {
                    if let Some(bucket) = state.buckets.get_mut(&key) {
                        settle_bucket(bucket, key, round, &mut outcome);
                    }
                }
            }
        }

        state.buckets.retain(|_, bucket| !bucket.is_empty());
        outcome
    }

    /// Cancel every pending waiter and refuse new registrations.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.inner.lock();
        state.closed = true;
        let mut count = 0;
        for waiter in state.drain() {
            waiter.finish(Err(RoundAwaitError::Canceled));
            count += 1;
        }
        count
    }

    /// Fail every pending waiter with `reason`. The registry stays open.
    pub fn fail_all(&self, reason: RoundAwaitError) -> usize {
        let mut state = self.inner.lock();
        let mut count = 0;
        for waiter in state.drain() {
            waiter.finish(Err(reason.clone()));
            count += 1;
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Total number of pending waiters across all buckets.
    pub fn pending(&self) -> usize {
        self.inner.lock().buckets.values().map(Vec::len).sum()
    }

    pub fn pending_for(&self, key: RoundKey) -> usize {
        self.inner.lock().buckets.get(&key).map_or(0, Vec::len)
    }
}

/// Cancel one waiter as soon as its token fires. Exits without touching the
/// registry once the waiter has been settled some other way.
async fn watch_cancellation(
    registry: Weak<Mutex<RegistryState>>,
    key: RoundKey,
    id: u64,
    cancel: CancellationToken,
    settled: CancellationToken,
) {
    tokio::select! {
        biased;
        _ = settled.cancelled() => {}
        _ = cancel.cancelled() => {
            let Some(inner) = registry.upgrade() else { return };
            let waiter = inner.lock().take(key, id);
            if let Some(waiter) = waiter {
                trace!(%key, waiter_id = id, "round awaiter canceled by its token");
                waiter.finish(Err(RoundAwaitError::Canceled));
            }
        }
    }
}

/// Resolve matching waiters of `bucket` with `round`, keeping the rest in order.
fn settle_bucket(bucket: &mut Vec<Waiter>, key: RoundKey, round: &RoundState, outcome: &mut TickOutcome) {
    for waiter in std::mem::take(bucket) {
        match catch_unwind(AssertUnwindSafe(|| (waiter.predicate)(round))) {
            Ok(true) => {
                waiter.finish(Ok(round.clone()));
                outcome.resolved += 1;
            }
            Ok(false) => bucket.push(waiter),
            Err(_) => {
                warn!(%key, round = %round.id, waiter_id = waiter.id, "round predicate panicked");
                waiter.finish(Err(RoundAwaitError::PredicatePanicked { round: round.id, key }));
                outcome.failed += 1;
            }
        }
    }
}
