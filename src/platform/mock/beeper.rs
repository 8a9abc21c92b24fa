//! Mock beeper that records emitted signals

use crate::platform::traits::{BeeperInterface, BeeperSignal};

/// Mock beeper implementation
///
/// Records every signal so tests can assert on the audible feedback a
/// calibration sequence produced. The buffer is bounded; once full, further
/// signals are counted but not stored.
#[derive(Debug, Default)]
pub struct MockBeeper {
    signals: heapless::Vec<BeeperSignal, 64>,
    emitted: usize,
}

impl MockBeeper {
    /// Create a new mock beeper
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded signals, oldest first
    pub fn signals(&self) -> &[BeeperSignal] {
        &self.signals
    }

    /// Total number of signals emitted (including dropped ones)
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Last recorded signal, if any
    pub fn last(&self) -> Option<BeeperSignal> {
        self.signals.last().copied()
    }

    /// Number of recorded occurrences of `signal`
    pub fn count_of(&self, signal: BeeperSignal) -> usize {
        self.signals.iter().filter(|s| **s == signal).count()
    }

    /// Forget everything recorded so far
    pub fn clear(&mut self) {
        self.signals.clear();
        self.emitted = 0;
    }
}

impl BeeperInterface for MockBeeper {
    fn beep(&mut self, signal: BeeperSignal) {
        self.emitted += 1;
        let _ = self.signals.push(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_beeper_records_signals() {
        let mut beeper = MockBeeper::new();
        beeper.beep(BeeperSignal::Waiting);
        beeper.beep(BeeperSignal::Ready);

        assert_eq!(beeper.signals(), &[BeeperSignal::Waiting, BeeperSignal::Ready]);
        assert_eq!(beeper.last(), Some(BeeperSignal::Ready));
        assert_eq!(beeper.count_of(BeeperSignal::Waiting), 1);
        assert_eq!(beeper.emitted(), 2);
    }

    #[test]
    fn test_mock_beeper_clear() {
        let mut beeper = MockBeeper::new();
        beeper.beep(BeeperSignal::Fail);
        beeper.clear();
        assert!(beeper.signals().is_empty());
        assert_eq!(beeper.emitted(), 0);
    }
}
