//! Phased back-off helper for spin-wait loops.
//!
//! Polling loops call [`SpinWait::spin_once`] each time around. The first
//! ten calls issue exponentially longer bursts of CPU pause hints, keeping
//! the core available to a sibling hyper-thread; after that the thread
//! yields its time slice, with every twentieth call sleeping for about a
//! millisecond so a starved system can make progress.

use std::thread;
use std::time::Duration;

// Phase at which spin_once stops pausing and starts yielding.
const YIELD_PHASE: u32 = 10;

/// A helper for implementing spin-wait loops.
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use seqring::SpinWait;
///
/// let flag = AtomicBool::new(true);
/// let mut spinner = SpinWait::new();
/// while !flag.load(Ordering::Acquire) {
///     spinner.spin_once();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SpinWait {
    phase: u32,
}

impl SpinWait {
    /// Create a new spinner.
    ///
    /// On single-core hosts the pause phase is skipped entirely, since
    /// busy-waiting there can only delay the thread being waited on.
    pub fn new() -> Self {
        let mut spinner = Self { phase: 0 };
        spinner.reset();
        spinner
    }

    /// Reset the spinner back to its initial state.
    pub fn reset(&mut self) {
        let multi_core = thread::available_parallelism().map_or(true, |n| n.get() > 1);
        self.phase = if multi_core { 0 } else { YIELD_PHASE };
    }

    /// Wait for a short period of time.
    ///
    /// Call this once each time through a spin-wait loop.
    pub fn spin_once(&mut self) {
        if self.next_spin_will_yield() {
            let count = self.phase - YIELD_PHASE;
            if count % 20 == 19 {
                thread::sleep(Duration::from_millis(1));
            } else {
                thread::yield_now();
            }
        } else {
            let mut count = 4u32 << self.phase;
            while count != 0 {
                std::hint::spin_loop();
                count -= 1;
            }
        }
        // On overflow wrap back to the yield phase, never to the pause phase.
        self.phase = if self.phase == u32::MAX {
            YIELD_PHASE
        } else {
            self.phase + 1
        };
    }

    /// Whether the next call to [`spin_once`](Self::spin_once) will yield
    /// the remainder of the thread's time slice.
    ///
    /// Wait loops with a deadline use this to only consult the clock once
    /// the spinner has left its cheap pause phase.
    #[inline]
    pub fn next_spin_will_yield(&self) -> bool {
        self.phase >= YIELD_PHASE
    }
}

impl Default for SpinWait {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_advances_towards_yield() {
        let mut spinner = SpinWait { phase: 0 };
        assert!(!spinner.next_spin_will_yield());
        for _ in 0..YIELD_PHASE {
            spinner.spin_once();
        }
        assert!(spinner.next_spin_will_yield());
    }

    #[test]
    fn test_yield_phase_is_sticky() {
        let mut spinner = SpinWait { phase: YIELD_PHASE };
        for _ in 0..5 {
            spinner.spin_once();
            assert!(spinner.next_spin_will_yield());
        }
    }

    #[test]
    fn test_phase_wraps_to_yield_not_pause() {
        let mut spinner = SpinWait { phase: u32::MAX };
        spinner.spin_once();
        assert_eq!(spinner.phase, YIELD_PHASE);
        assert!(spinner.next_spin_will_yield());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut spinner = SpinWait::new();
        let initial = spinner.phase;
        for _ in 0..3 {
            spinner.spin_once();
        }
        spinner.reset();
        assert_eq!(spinner.phase, initial);
    }
}
