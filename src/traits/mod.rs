pub mod coordinator;
pub mod periodic;

pub use coordinator::RoundStatusProvider;
pub use periodic::PeriodicTask;
