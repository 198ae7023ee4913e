//! Predicate-gated round awaiters.
//!
//! - `registry`: the mutex-guarded bucket table shared by ticks and callers
//! - `round_awaiter`: the caller-side future resolved exactly once

pub mod registry;
pub mod round_awaiter;

pub use registry::{AwaiterRegistry, TickOutcome};
pub use round_awaiter::RoundAwaiter;

use crate::error::RoundAwaitError;
use crate::types::RoundState;

/// What a round awaiter finally yields.
pub type AwaitOutcome = Result<RoundState, RoundAwaitError>;

/// Condition a caller waits for. Must be pure and must not panic; it runs
/// under the registry lock, so it must not touch the registry itself.
pub type RoundPredicate = Box<dyn Fn(&RoundState) -> bool + Send + Sync + 'static>;
