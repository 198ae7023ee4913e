use thiserror::Error;

use crate::types::{RoundId, RoundKey};

/// Terminal outcome of a round awaiter other than a match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundAwaitError {
    #[error("round {0} is not running anymore")]
    RoundNotRunning(RoundId),

    #[error("round awaiter was canceled")]
    Canceled,

    #[error("predicate panicked while evaluating round {round}")]
    PredicatePanicked { round: RoundId, key: RoundKey },

    #[error("round state updater is stopped")]
    Stopped,
}

impl RoundAwaitError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, RoundAwaitError::Canceled)
    }
}

/// Lifecycle errors of the updater service.
#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("round state updater was already stopped and cannot be restarted")]
    AlreadyStopped,

    #[error("round state updater task panicked")]
    TaskPanicked,
}
