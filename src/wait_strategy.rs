//! Wait strategies for threads blocked on sequence publication.
//!
//! A wait strategy decides how a thread passes the time until a set of
//! observed sequence cells reaches a target sequence. Barriers, barrier
//! groups and sequencers are generic over this capability so the choice of
//! blocking discipline compiles down to direct calls on the wait loop.
//!
//! Two disciplines are provided: [`SpinWaitStrategy`] burns CPU in a phased
//! busy-wait for the lowest latency, while [`BlockingWaitStrategy`] parks
//! waiters on a condition variable for the lowest CPU cost.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::sequence::{difference, minimum_sequence_after, AtomicSequence, Sequence};
use crate::spin_wait::SpinWait;

/// Strategy for blocking a thread until observed sequences reach a target.
///
/// Publishers call [`signal_all_when_blocking`](Self::signal_all_when_blocking)
/// after every release-store so parked waiters re-check their predicate.
/// Waiters detect a timed-out deadline wait by
/// `difference(result, target) < 0` on the returned observation; timeouts
/// are never reported through panics or errors.
pub trait WaitStrategy: Send + Sync {
    /// Block until every cell in `sequences` has reached `target`.
    ///
    /// # Returns
    /// The minimum observed sequence, guaranteed not to precede `target`.
    fn wait_until_published(&self, target: Sequence, sequences: &[&AtomicSequence]) -> Sequence;

    /// Block until every cell in `sequences` has reached `target`, or until
    /// `deadline` has passed, whichever comes first.
    ///
    /// # Returns
    /// The minimum observed sequence. If it precedes `target` the wait
    /// timed out and the value may only be used to decide to retry.
    fn wait_until_published_with_deadline(
        &self,
        target: Sequence,
        sequences: &[&AtomicSequence],
        deadline: Instant,
    ) -> Sequence;

    /// Duration form of the deadline wait.
    fn wait_until_published_with_timeout(
        &self,
        target: Sequence,
        sequences: &[&AtomicSequence],
        timeout: Duration,
    ) -> Sequence {
        self.wait_until_published_with_deadline(target, sequences, Instant::now() + timeout)
    }

    /// Wake all blocked waiters so they re-check their target.
    ///
    /// Called by every publisher after a release-store. Strategies that
    /// never put threads to sleep implement this as a no-op.
    fn signal_all_when_blocking(&self);
}

/// Busy-wait strategy with phased back-off.
///
/// Waiting threads poll the sequence cells in a tight loop, pausing the
/// processor for the first iterations and then yielding their time slice
/// via [`SpinWait`]. Deadlines are only consulted once the spinner reaches
/// its yield phase, which keeps clock reads off the fast path.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinWaitStrategy;

impl SpinWaitStrategy {
    /// Create a new spin wait strategy.
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for SpinWaitStrategy {
    fn wait_until_published(&self, target: Sequence, sequences: &[&AtomicSequence]) -> Sequence {
        let mut spinner = SpinWait::new();
        let mut result = minimum_sequence_after(target, sequences);
        while difference(result, target) < 0 {
            spinner.spin_once();
            result = minimum_sequence_after(target, sequences);
        }
        result
    }

    fn wait_until_published_with_deadline(
        &self,
        target: Sequence,
        sequences: &[&AtomicSequence],
        deadline: Instant,
    ) -> Sequence {
        let mut spinner = SpinWait::new();
        let mut result = minimum_sequence_after(target, sequences);
        while difference(result, target) < 0 {
            if spinner.next_spin_will_yield() && Instant::now() >= deadline {
                return result;
            }
            spinner.spin_once();
            result = minimum_sequence_after(target, sequences);
        }
        result
    }

    fn signal_all_when_blocking(&self) {
        // Spinning waiters observe the sequence cells directly.
    }
}

/// Condition-variable strategy that parks waiting threads.
///
/// All blocked threads are woken whenever any publisher signals, regardless
/// of which cells they are waiting on; each waiter re-evaluates its own
/// predicate under the mutex, so spurious wakes are harmless.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    /// Create a new blocking wait strategy.
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_until_published(&self, target: Sequence, sequences: &[&AtomicSequence]) -> Sequence {
        let mut guard = self.mutex.lock();
        loop {
            let result = minimum_sequence_after(target, sequences);
            if difference(result, target) >= 0 {
                return result;
            }
            self.condvar.wait(&mut guard);
        }
    }

    fn wait_until_published_with_deadline(
        &self,
        target: Sequence,
        sequences: &[&AtomicSequence],
        deadline: Instant,
    ) -> Sequence {
        let mut guard = self.mutex.lock();
        loop {
            let result = minimum_sequence_after(target, sequences);
            if difference(result, target) >= 0 {
                return result;
            }
            if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                // Final observation under the mutex; a publish that raced
                // the deadline still wins.
                return minimum_sequence_after(target, sequences);
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        // The lock closes the window where a waiter has evaluated its
        // predicate but not yet parked on the condition variable.
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}
