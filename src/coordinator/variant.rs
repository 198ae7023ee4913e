use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{file::FileCoordinator, mock::MockCoordinator, noop::NoopCoordinator};
use crate::config::{CoordinatorType, UpdaterConfig};
use crate::traits::RoundStatusProvider;
use crate::types::RoundState;

/// Enum representing all possible coordinator backends.
pub enum CoordinatorVariant {
    Noop(NoopCoordinator),
    Mock(MockCoordinator),
    File(FileCoordinator),
}

impl CoordinatorVariant {
    /// Create a coordinator backend based on the configured type.
    pub fn new(config: &UpdaterConfig) -> Self {
        match config.coordinator {
            CoordinatorType::Noop => CoordinatorVariant::Noop(NoopCoordinator),
            CoordinatorType::Mock => CoordinatorVariant::Mock(MockCoordinator::default()),
            CoordinatorType::File => {
                CoordinatorVariant::File(FileCoordinator::new(config.rounds_file.clone()))
            }
        }
    }
}

impl From<MockCoordinator> for CoordinatorVariant {
    fn from(mock: MockCoordinator) -> Self {
        CoordinatorVariant::Mock(mock)
    }
}

#[async_trait]
impl RoundStatusProvider for CoordinatorVariant {
    fn name(&self) -> &'static str {
        match self {
            CoordinatorVariant::Noop(inner) => inner.name(),
            CoordinatorVariant::Mock(inner) => inner.name(),
            CoordinatorVariant::File(inner) => inner.name(),
        }
    }

    async fn fetch_rounds(&self, cancel: &CancellationToken) -> Result<Vec<RoundState>> {
        match self {
            CoordinatorVariant::Noop(inner) => inner.fetch_rounds(cancel).await,
            CoordinatorVariant::Mock(inner) => inner.fetch_rounds(cancel).await,
            CoordinatorVariant::File(inner) => inner.fetch_rounds(cancel).await,
        }
    }
}
