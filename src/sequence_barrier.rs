//! Single-writer cursor publishing a "done up to" sequence.

use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use std::sync::atomic::Ordering;

use crate::sequence::{difference, AtomicSequence, Sequence};
use crate::wait_strategy::WaitStrategy;
use crate::INITIAL_CURSOR_VALUE;

/// A sequence barrier holds a sequence number used to publish which item
/// has finished processing and is now available.
///
/// Publishing a sequence number implies that it and all prior sequence
/// numbers are available for downstream threads to consume. Only a single
/// thread may publish to a barrier, and it must publish strictly
/// increasing sequences; any number of threads may wait on it.
///
/// The barrier borrows its wait strategy, so the strategy must outlive
/// every barrier and group constructed from it.
#[derive(Debug)]
pub struct SequenceBarrier<'w, W: WaitStrategy> {
    wait_strategy: &'w W,
    // Padded on both sides so writer and readers do not false-share with
    // neighbouring fields.
    last_published: CachePadded<AtomicSequence>,
}

impl<'w, W: WaitStrategy> SequenceBarrier<'w, W> {
    /// Create a barrier whose next published sequence will be zero.
    pub fn new(wait_strategy: &'w W) -> Self {
        Self::with_initial_sequence(wait_strategy, INITIAL_CURSOR_VALUE)
    }

    /// Create a barrier that reports `initial` as already published.
    ///
    /// Used when a pipeline resumes from a known sequence instead of
    /// starting at zero.
    pub fn with_initial_sequence(wait_strategy: &'w W, initial: Sequence) -> Self {
        tracing::trace!(initial, "sequence barrier created");
        Self {
            wait_strategy,
            last_published: CachePadded::new(AtomicSequence::new(initial)),
        }
    }

    /// The sequence number last published to this barrier.
    ///
    /// Synchronises with the corresponding [`publish`](Self::publish) and
    /// has acquire semantics.
    #[inline]
    pub fn last_published(&self) -> Sequence {
        self.last_published.load(Ordering::Acquire)
    }

    /// Publish `sequence`, making it and all prior sequences visible to
    /// waiters.
    ///
    /// Release-stores the cursor and wakes any parked waiters.
    pub fn publish(&self, sequence: Sequence) {
        self.last_published.store(sequence, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Block until `sequence` has been published.
    ///
    /// # Returns
    /// The last-published sequence, guaranteed not to precede `sequence`.
    pub fn wait_until_published(&self, sequence: Sequence) -> Sequence {
        let current = self.last_published();
        if difference(current, sequence) >= 0 {
            return current;
        }
        let cells: [&AtomicSequence; 1] = [&self.last_published];
        self.wait_strategy.wait_until_published(sequence, &cells)
    }

    /// Block until `sequence` has been published or `deadline` has passed.
    ///
    /// # Returns
    /// The last-published sequence. If `difference(result, sequence) < 0`
    /// the wait timed out.
    pub fn wait_until_published_with_deadline(
        &self,
        sequence: Sequence,
        deadline: Instant,
    ) -> Sequence {
        let current = self.last_published();
        if difference(current, sequence) >= 0 {
            return current;
        }
        let cells: [&AtomicSequence; 1] = [&self.last_published];
        self.wait_strategy
            .wait_until_published_with_deadline(sequence, &cells, deadline)
    }

    /// Duration form of
    /// [`wait_until_published_with_deadline`](Self::wait_until_published_with_deadline).
    pub fn wait_until_published_with_timeout(
        &self,
        sequence: Sequence,
        timeout: Duration,
    ) -> Sequence {
        self.wait_until_published_with_deadline(sequence, Instant::now() + timeout)
    }

    /// The raw cursor cell, for aggregation into barrier groups.
    pub(crate) fn cell(&self) -> &AtomicSequence {
        &self.last_published
    }

    /// The wait strategy this barrier was built with.
    pub(crate) fn wait_strategy(&self) -> &'w W {
        self.wait_strategy
    }
}
