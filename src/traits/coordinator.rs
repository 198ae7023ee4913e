use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::RoundState;

/// Trait for coordinator backends that report the currently active rounds.
///
/// Implementations hide the transport; the updater only needs one full
/// snapshot of every active round per call.
#[async_trait]
pub trait RoundStatusProvider: Send + Sync {
    /// Human-readable backend name for logging.
    fn name(&self) -> &'static str;

    /// Fetch the state of every active round.
    ///
    /// Any error (transport, malformed data, cancellation) makes the caller
    /// skip the current tick; it is never read as "all rounds removed".
    async fn fetch_rounds(&self, cancel: &CancellationToken) -> Result<Vec<RoundState>>;
}
