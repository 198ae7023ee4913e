use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::traits::RoundStatusProvider;
use crate::types::RoundState;

/// File-based coordinator.
/// Reads a JSON array of round states from disk on every fetch, so an
/// external process can drive the updater by rewriting the file.
pub struct FileCoordinator {
    path: PathBuf,
}

impl FileCoordinator {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl RoundStatusProvider for FileCoordinator {
    fn name(&self) -> &'static str {
        "file-coordinator"
    }

    async fn fetch_rounds(&self, cancel: &CancellationToken) -> Result<Vec<RoundState>> {
        let bytes = tokio::select! {
            _ = cancel.cancelled() => bail!("fetch canceled"),
            res = tokio::fs::read(&self.path) => {
                res.with_context(|| format!("failed to read rounds file {:?}", self.path))?
            }
        };

        let rounds: Vec<RoundState> = serde_json::from_slice(&bytes)
            .with_context(|| format!("malformed rounds file {:?}", self.path))?;

        tracing::debug!("FileCoordinator: read {} rounds from {:?}", rounds.len(), self.path);
        Ok(rounds)
    }
}
