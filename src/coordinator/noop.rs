use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::traits::RoundStatusProvider;
use crate::types::RoundState;

/// Coordinator that never reports any round.
pub struct NoopCoordinator;

#[async_trait]
impl RoundStatusProvider for NoopCoordinator {
    fn name(&self) -> &'static str {
        "noop-coordinator"
    }

    async fn fetch_rounds(&self, _cancel: &CancellationToken) -> Result<Vec<RoundState>> {
        tracing::trace!("NoopCoordinator: fetch_rounds() called - no rounds");
        Ok(Vec::new())
    }
}
