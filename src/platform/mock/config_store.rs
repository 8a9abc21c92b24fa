//! Mock configuration store counting save requests

use crate::platform::traits::ConfigStore;

/// Mock configuration store implementation
///
/// Counts save requests so tests can verify a calibration persisted its
/// result exactly once (and never mid-sequence).
#[derive(Debug, Default)]
pub struct MockConfigStore {
    save_requests: u32,
}

impl MockConfigStore {
    /// Create a new mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of save requests received
    pub fn save_requests(&self) -> u32 {
        self.save_requests
    }
}

impl ConfigStore for MockConfigStore {
    fn request_save(&mut self) {
        self.save_requests += 1;
    }
}
