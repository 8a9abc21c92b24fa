//! Platform abstraction layer
//!
//! The tail mixer never touches hardware directly. The surrounding firmware
//! injects a monotonic clock, a beeper sink and a configuration persistence
//! trigger through the traits defined here.

pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types
pub use traits::{BeeperInterface, BeeperSignal, ClockInterface, ConfigStore};
