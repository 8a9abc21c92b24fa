//! Audible feedback sink
//!
//! The tail tune state machine is operated blind (sticks only), so every
//! transition worth knowing about is signalled through the beeper.

/// Signals the tail tune state machine emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeeperSignal {
    /// Periodic beep while waiting for the tuning window to open
    Waiting,
    /// Longer beep when measurement starts
    Starting,
    /// N short confirmation beeps (gesture acknowledge, sample tick)
    Confirmation(u8),
    /// Sequence step completed
    Ready,
    /// Calibration accepted and persisted
    Success,
    /// Calibration rejected, nothing persisted
    Fail,
}

/// Beeper sink interface
pub trait BeeperInterface {
    /// Queue a signal. Must not block.
    fn beep(&mut self, signal: BeeperSignal);
}
