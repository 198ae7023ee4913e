pub mod file;
pub mod mock;
pub mod noop;
pub mod variant;

pub use file::FileCoordinator;
pub use mock::MockCoordinator;
pub use noop::NoopCoordinator;
pub use variant::CoordinatorVariant;
