//! Mock platform implementations for testing
//!
//! Available during test builds and when the `mock` feature is enabled,
//! mirroring the real capability traits without hardware.

#![cfg(any(test, feature = "mock"))]

mod beeper;
mod clock;
mod config_store;

pub use beeper::MockBeeper;
pub use clock::MockClock;
pub use config_store::MockConfigStore;
