// Library exports for the binary, tests and embedding clients

pub mod awaiter;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod reconciler;
pub mod runner;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod updater;

// Re-export commonly used types and traits
pub use awaiter::{AwaiterRegistry, RoundAwaiter};
pub use config::{CoordinatorType, UpdaterConfig};
pub use error::{RoundAwaitError, UpdaterError};
pub use reconciler::{reconcile, Reconciliation};
pub use runner::PeriodicRunner;
pub use traits::{PeriodicTask, RoundStatusProvider};
pub use types::{Phase, RoundId, RoundKey, RoundState, RoundTable};
pub use updater::{RoundStateUpdater, TickReport};

// Re-export variant enums for convenience
pub use coordinator::{CoordinatorVariant, FileCoordinator, MockCoordinator, NoopCoordinator};

pub use tokio_util::sync::CancellationToken;
