//! Configuration persistence trigger
//!
//! The persistence format and flash handling live outside this crate. The
//! tail mixer only signals that the in-memory configuration should be saved;
//! calibration sequences do so exactly once at their terminal transition.

/// Configuration persistence interface
pub trait ConfigStore {
    /// Request that the current configuration is written to persistent
    /// storage. Must not block; the actual write may happen later.
    fn request_save(&mut self);
}
