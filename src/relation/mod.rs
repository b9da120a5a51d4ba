pub mod fork;
pub mod locator;

pub use fork::ForkNumber;
pub use locator::{RelationLocator, RelationLocatorBackend};
