//! Round state updater, split into:
//! - `core`: the updater struct, awaiter registration and accessors
//! - `tasks`: the tick body and the background task lifecycle
//! - `tests`: unit tests driving ticks one at a time

pub mod core;
pub mod tasks;

pub use self::core::RoundStateUpdater;
pub use tasks::{tick_once, RoundUpdateTask, TickReport};
