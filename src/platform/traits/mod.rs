//! Capability traits the firmware injects into the tail mixer

pub mod beeper;
pub mod clock;
pub mod config_store;

// Re-export trait interfaces
pub use beeper::{BeeperInterface, BeeperSignal};
pub use clock::ClockInterface;
pub use config_store::ConfigStore;
