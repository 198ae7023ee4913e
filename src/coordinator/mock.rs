use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::traits::RoundStatusProvider;
use crate::types::{RoundId, RoundState};

#[derive(Default)]
struct MockState {
    rounds: Vec<RoundState>,
    pending_failures: usize,
    fetches: usize,
    delay: Option<Duration>,
}

/// Scriptable in-memory coordinator for testing.
/// Clones share the same script, so a test can keep a handle and change the
/// rounds while the updater owns another.
#[derive(Clone, Default)]
pub struct MockCoordinator {
    state: Arc<Mutex<MockState>>,
}

impl MockCoordinator {
    pub fn new(rounds: Vec<RoundState>) -> Self {
        let mock = Self::default();
        mock.set_rounds(rounds);
        mock
    }

    /// Replace the whole round list returned by the next fetches.
    pub fn set_rounds(&self, rounds: Vec<RoundState>) {
        self.state.lock().rounds = rounds;
    }

    /// Insert a round or replace the one with the same id.
    pub fn upsert_round(&self, round: RoundState) {
        let mut state = self.state.lock();
        match state.rounds.iter_mut().find(|r| r.id == round.id) {
            Some(existing) => *existing = round,
            None => state.rounds.push(round),
        }
    }

    pub fn remove_round(&self, id: &RoundId) {
        self.state.lock().rounds.retain(|r| &r.id != id);
    }

    /// Make the next `count` fetches fail.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().pending_failures = count;
    }

    /// Delay every fetch, to simulate a slow coordinator.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    /// Number of fetches attempted so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches
    }
}

#[async_trait]
impl RoundStatusProvider for MockCoordinator {
    fn name(&self) -> &'static str {
        "mock-coordinator"
    }

    async fn fetch_rounds(&self, cancel: &CancellationToken) -> Result<Vec<RoundState>> {
        let delay = {
            let mut state = self.state.lock();
            state.fetches += 1;
            state.delay
        };

        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => bail!("fetch canceled"),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let mut state = self.state.lock();
        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            bail!("mock coordinator unavailable");
        }
        tracing::debug!("MockCoordinator: returning {} rounds", state.rounds.len());
        Ok(state.rounds.clone())
    }
}
