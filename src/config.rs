use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

/// Coordinator backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorType {
    Noop,
    Mock,
    File,
}

/// Configuration for the round state updater.
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
pub struct UpdaterConfig {
    /// Interval between two coordinator polls, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Coordinator backend to poll.
    #[arg(long, value_enum, default_value_t = CoordinatorType::File)]
    pub coordinator: CoordinatorType,

    /// JSON file with the active rounds (file coordinator only).
    #[arg(long, default_value = "./rounds.json")]
    pub rounds_file: PathBuf,

    /// Default tracing filter, overridden by RUST_LOG.
    #[arg(long, default_value = "roundwatch=info")]
    pub log_filter: String,
}

impl UpdaterConfig {
    /// Poll interval as a duration, never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        UpdaterConfig {
            poll_interval_ms: 1000,
            coordinator: CoordinatorType::File,
            rounds_file: PathBuf::from("./rounds.json"),
            log_filter: "roundwatch=info".to_string(),
        }
    }
}
