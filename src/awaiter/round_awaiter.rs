use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use super::registry::{remove_waiter, RegistryState};
use super::AwaitOutcome;
use crate::error::RoundAwaitError;
use crate::types::RoundKey;

/// Future returned by round awaiter registration.
///
/// Resolves once with the matching snapshot, `RoundNotRunning`, or
/// `Canceled`. When the caller's token fires, the waiter is pulled from the
/// registry under its lock; if a tick got there first, the tick's outcome is
/// returned instead. Dropping an unresolved awaiter deregisters it.
///
/// Like most futures it must not be polled again once it has returned
/// `Poll::Ready`; doing so panics.
pub struct RoundAwaiter {
    key: RoundKey,
    waiter_id: u64,
    rx: oneshot::Receiver<AwaitOutcome>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    registry: Weak<Mutex<RegistryState>>,
    done: bool,
}

impl RoundAwaiter {
    pub(crate) fn new(
        key: RoundKey,
        waiter_id: u64,
        rx: oneshot::Receiver<AwaitOutcome>,
        cancel: CancellationToken,
        registry: Weak<Mutex<RegistryState>>,
    ) -> Self {
        Self {
            key,
            waiter_id,
            rx,
            cancelled: Box::pin(cancel.cancelled_owned()),
            registry,
            done: false,
        }
    }

    /// Bucket this awaiter was registered under.
    pub fn key(&self) -> RoundKey {
        self.key
    }
}

impl Future for RoundAwaiter {
    type Output = AwaitOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        if this.done {
            panic!("RoundAwaiter polled after completion");
        }

        if let Poll::Ready(res) = Pin::new(&mut this.rx).poll(cx) {
            this.done = true;
            // A dropped sender means the registry itself went away.
            return Poll::Ready(res.unwrap_or(Err(RoundAwaitError::Canceled)));
        }

        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.done = true;
            if remove_waiter(&this.registry, this.key, this.waiter_id) {
                return Poll::Ready(Err(RoundAwaitError::Canceled));
            }
            // Lost the race: whoever removed the waiter already sent its outcome.
            return Poll::Ready(this.rx.try_recv().unwrap_or(Err(RoundAwaitError::Canceled)));
        }

        Poll::Pending
    }
}

impl Drop for RoundAwaiter {
    fn drop(&mut self) {
        if !self.done {
            remove_waiter(&self.registry, self.key, self.waiter_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use crate::awaiter::AwaiterRegistry;
    use crate::error::RoundAwaitError;
    use crate::types::{Phase, RoundId, RoundKey, RoundState, RoundTable};
    use tokio_util::sync::CancellationToken;

    fn round(id: u8, phase: Phase) -> RoundState {
        let mut bytes = [0u8; 32];
        bytes[0] = id;
        RoundState::new(RoundId::new(bytes), phase)
    }

    #[tokio::test]
    async fn test_cancel_removes_waiter() {
        let registry = AwaiterRegistry::new();
        let cancel = CancellationToken::new();
        let a = round(1, Phase::InputRegistration);

        let awaiter = registry.register(a.id.into(), |_| false, cancel.clone());
        let handle = tokio::spawn(awaiter);

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), Err(RoundAwaitError::Canceled));
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_token() {
        let registry = AwaiterRegistry::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let awaiter = registry.register(RoundKey::AnyRound, |_| true, cancel);
        assert_eq!(awaiter.await, Err(RoundAwaitError::Canceled));
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_resolution_keeps_result() {
        let registry = AwaiterRegistry::new();
        let cancel = CancellationToken::new();
        let a = round(1, Phase::TransactionSigning);

        let awaiter = registry.register(a.id.into(), |_| true, cancel.clone());

        let table: RoundTable = [(a.id, a.clone())].into_iter().collect();
        let changed: HashSet<RoundId> = [a.id].into_iter().collect();
        registry.reconcile_tick(&table, &changed);

        // Token fires after the tick settled the waiter but before the caller polls.
        cancel.cancel();
        assert_eq!(awaiter.await.unwrap(), a);
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let registry = AwaiterRegistry::new();
        let a = round(1, Phase::InputRegistration);

        let awaiter = registry.register(a.id.into(), |_| false, CancellationToken::new());
        assert_eq!(registry.pending(), 1);

        drop(awaiter);
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "RoundAwaiter polled after completion")]
    async fn test_poll_after_completion_panics() {
        let registry = AwaiterRegistry::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut awaiter = registry.register(RoundKey::AnyRound, |_| true, cancel);
        assert_eq!((&mut awaiter).await, Err(RoundAwaitError::Canceled));
        let _ = (&mut awaiter).await;
    }

    #[tokio::test]
    async fn test_registry_dropped_cancels() {
        let registry = AwaiterRegistry::new();
        let a = round(1, Phase::InputRegistration);

        let awaiter = registry.register(a.id.into(), |_| false, CancellationToken::new());
        drop(registry);

        assert_eq!(awaiter.await, Err(RoundAwaitError::Canceled));
    }
}
