use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Unit of work driven by the periodic runner.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Name used for the runner's span and log lines.
    fn name(&self) -> &'static str;

    /// Run one tick. Errors are logged by the runner and the next tick is
    /// scheduled as usual.
    async fn tick(&self, cancel: &CancellationToken) -> Result<()>;
}
