//! Claim strategies coordinating producer access to ring buffer slots.
//!
//! A sequencer hands out contiguous sequence ranges to producers, enforces
//! back-pressure against registered consumer barriers, and publishes
//! committed sequences to consumers. [`SingleProducerSequencer`] avoids all
//! producer-side synchronisation when only one thread writes;
//! [`MultiProducerSequencer`] partitions the sequence space between
//! concurrent writers with a single wait-free fetch-add and reconciles
//! their out-of-order commits through a per-slot publication map.
//!
//! A producer must publish every sequence it claims. There is no rollback
//! for an abandoned claim; an unpublished sequence permanently blocks the
//! ring once the counter laps back to its slot.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;

use crate::barrier_group::SequenceBarrierGroup;
use crate::sequence::{difference, AtomicSequence, Sequence, SequenceRange};
use crate::sequence_barrier::SequenceBarrier;
use crate::wait_strategy::WaitStrategy;
use crate::{is_power_of_two, Result, RingError};

/// Claim strategy for a ring buffer with a single producer thread.
///
/// Only one thread may invoke the claim and publish operations; any number
/// of threads may consume through
/// [`wait_until_published`](Self::wait_until_published). Because a single
/// producer commits in order, publishing a sequence implicitly publishes
/// every earlier one, so a batch is published by its last sequence alone.
///
/// Consumers feed back-pressure by publishing the sequences they have
/// finished with into barriers registered via
/// [`add_claim_barrier`](Self::add_claim_barrier). A sequence can be
/// claimed only once every registered barrier has advanced to within
/// `buffer_size` of it.
#[derive(Debug)]
pub struct SingleProducerSequencer<'w, W: WaitStrategy> {
    buffer_size: usize,
    // Producer-thread state. Relaxed atomics rather than plain fields so
    // the sequencer stays shareable with consumer threads; the claim/publish
    // contract still permits only one writer.
    next_to_claim: AtomicSequence,
    last_known_claimable: AtomicSequence,
    claim_barrier: SequenceBarrierGroup<'w, W>,
    read_barrier: SequenceBarrier<'w, W>,
}

impl<'w, W: WaitStrategy> SingleProducerSequencer<'w, W> {
    /// Create a sequencer whose first claimed sequence will be zero.
    ///
    /// # Errors
    /// Returns [`RingError::InvalidBufferSize`] if `buffer_size` is not a
    /// power of two.
    pub fn new(buffer_size: usize, wait_strategy: &'w W) -> Result<Self> {
        Self::with_first_sequence(buffer_size, wait_strategy, 0)
    }

    /// Create a sequencer whose first claimed sequence will be `first`.
    ///
    /// Used to resume a stream from a known sequence; consumers must then
    /// start observing from `first - 1` instead of the usual sentinel.
    ///
    /// # Errors
    /// Returns [`RingError::InvalidBufferSize`] if `buffer_size` is not a
    /// power of two.
    pub fn with_first_sequence(
        buffer_size: usize,
        wait_strategy: &'w W,
        first: Sequence,
    ) -> Result<Self> {
        if !is_power_of_two(buffer_size) {
            return Err(RingError::InvalidBufferSize(buffer_size));
        }
        tracing::debug!(buffer_size, first, "single producer sequencer created");
        Ok(Self {
            buffer_size,
            next_to_claim: AtomicSequence::new(first),
            last_known_claimable: AtomicSequence::new(first.wrapping_sub(1)),
            claim_barrier: SequenceBarrierGroup::new(wait_strategy),
            read_barrier: SequenceBarrier::with_initial_sequence(
                wait_strategy,
                first.wrapping_sub(1),
            ),
        })
    }

    /// The number of slots in the ring this sequencer coordinates.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Register a consumer barrier as claim back-pressure.
    ///
    /// Claimed sequences will never advance more than `buffer_size` ahead
    /// of any registered barrier. Setup-only; the claimable-sequence cache
    /// is left untouched and refreshed by the next claim attempt.
    pub fn add_claim_barrier(&mut self, barrier: &'w SequenceBarrier<'w, W>) {
        self.claim_barrier.add(barrier);
    }

    /// Register every member of a barrier group as claim back-pressure.
    pub fn add_claim_barrier_group(&mut self, group: &SequenceBarrierGroup<'w, W>) {
        self.claim_barrier.add_group(group);
    }

    /// Claim a single slot, blocking until one is available.
    ///
    /// # Returns
    /// The sequence number of the claimed slot.
    pub fn claim_one(&self) -> Sequence {
        self.claim(1).first()
    }

    /// Claim up to `count` slots, blocking until at least one is available.
    ///
    /// The returned range may hold fewer slots than requested, but never
    /// zero when `count > 0`. Once written, the batch is committed by
    /// passing its last sequence to [`publish`](Self::publish).
    pub fn claim(&self, count: usize) -> SequenceRange {
        if let Some(range) = self.try_claim(count) {
            return range;
        }

        let next = self.next_to_claim.load(Ordering::Relaxed);
        let claimable = self
            .claim_barrier
            .wait_until_published(next.wrapping_sub(self.buffer_size as u64))
            .wrapping_add(self.buffer_size as u64);

        let diff = difference(claimable, next);
        debug_assert!(diff >= 0);

        let count = count.min((diff + 1) as usize);
        let range = SequenceRange::new(next, count);
        self.next_to_claim
            .store(next.wrapping_add(count as u64), Ordering::Relaxed);
        self.last_known_claimable
            .store(claimable, Ordering::Relaxed);
        range
    }

    /// Attempt to claim up to `count` slots without blocking.
    ///
    /// # Returns
    /// The claimed range (possibly shorter than requested), or `None` if
    /// no slot is currently claimable.
    pub fn try_claim(&self, count: usize) -> Option<SequenceRange> {
        let next = self.next_to_claim.load(Ordering::Relaxed);
        let mut diff = difference(self.last_known_claimable.load(Ordering::Relaxed), next);
        if diff < 0 {
            let claimable = self
                .claim_barrier
                .last_published()
                .wrapping_add(self.buffer_size as u64);
            diff = difference(claimable, next);
            if diff < 0 {
                return None;
            }
            // Only refresh the cache when a claim will actually happen; a
            // stale cache already reports "check again next time".
            self.last_known_claimable
                .store(claimable, Ordering::Relaxed);
        }

        let count = count.min((diff + 1) as usize);
        let range = SequenceRange::new(next, count);
        self.next_to_claim
            .store(next.wrapping_add(count as u64), Ordering::Relaxed);
        Some(range)
    }

    /// Attempt to claim up to `count` slots, waiting up to `timeout`.
    pub fn try_claim_for(&self, count: usize, timeout: Duration) -> Option<SequenceRange> {
        self.try_claim_until(count, Instant::now() + timeout)
    }

    /// Attempt to claim up to `count` slots, waiting until `deadline`.
    ///
    /// # Returns
    /// The claimed range, or `None` if the deadline passed with no slot
    /// claimable. A timed-out attempt leaves the claim state untouched.
    pub fn try_claim_until(&self, count: usize, deadline: Instant) -> Option<SequenceRange> {
        if let Some(range) = self.try_claim(count) {
            return Some(range);
        }

        let next = self.next_to_claim.load(Ordering::Relaxed);
        let claimable = self
            .claim_barrier
            .wait_until_published_with_deadline(
                next.wrapping_sub(self.buffer_size as u64),
                deadline,
            )
            .wrapping_add(self.buffer_size as u64);

        let diff = difference(claimable, next);
        if diff < 0 {
            return None;
        }

        let count = count.min((diff + 1) as usize);
        let range = SequenceRange::new(next, count);
        self.next_to_claim
            .store(next.wrapping_add(count as u64), Ordering::Relaxed);
        self.last_known_claimable
            .store(claimable, Ordering::Relaxed);
        Some(range)
    }

    /// Publish every sequence up to and including `sequence`.
    ///
    /// Release-stores the read cursor and wakes blocked consumers.
    pub fn publish(&self, sequence: Sequence) {
        self.read_barrier.publish(sequence);
    }

    /// The last sequence published by the producer.
    pub fn last_published(&self) -> Sequence {
        self.read_barrier.last_published()
    }

    /// Block the calling consumer until `sequence` has been published.
    ///
    /// # Returns
    /// The last published sequence, which may be ahead of the request;
    /// every slot up to the returned sequence is safe to read.
    pub fn wait_until_published(&self, sequence: Sequence) -> Sequence {
        self.read_barrier.wait_until_published(sequence)
    }

    /// Deadline form of [`wait_until_published`](Self::wait_until_published);
    /// a result preceding `sequence` means the wait timed out.
    pub fn wait_until_published_with_deadline(
        &self,
        sequence: Sequence,
        deadline: Instant,
    ) -> Sequence {
        self.read_barrier
            .wait_until_published_with_deadline(sequence, deadline)
    }

    /// Duration form of [`wait_until_published`](Self::wait_until_published).
    pub fn wait_until_published_with_timeout(
        &self,
        sequence: Sequence,
        timeout: Duration,
    ) -> Sequence {
        self.read_barrier
            .wait_until_published_with_timeout(sequence, timeout)
    }
}

/// Claim strategy for a ring buffer with concurrent producer threads.
///
/// Claiming is wait-free while the ring has capacity: the only contended
/// write is a relaxed `fetch_add` partitioning the sequence space. Each
/// producer then commits independently by release-storing the claimed
/// sequence into its slot's entry of the publication map, so a slow
/// producer delays only its own slot.
///
/// Consumers cannot observe the claim counter; they linearise the
/// out-of-order commits by scanning the publication map for contiguously
/// published sequences, via [`wait_until_published`](Self::wait_until_published)
/// and [`last_published_after`](Self::last_published_after).
#[derive(Debug)]
pub struct MultiProducerSequencer<'w, W: WaitStrategy> {
    buffer_size: usize,
    index_mask: u64,
    wait_strategy: &'w W,
    claim_barrier: SequenceBarrierGroup<'w, W>,
    // Entry i holds the latest committed sequence s with s & mask == i,
    // initialised one lap behind so fresh entries read as unpublished.
    published: Box<[AtomicSequence]>,
    // Isolated on its own cache line; every producer writes here.
    next_claimable: CachePadded<AtomicSequence>,
}

impl<'w, W: WaitStrategy> MultiProducerSequencer<'w, W> {
    /// Create a sequencer whose first claimed sequence will be zero.
    ///
    /// # Errors
    /// Returns [`RingError::InvalidBufferSize`] if `buffer_size` is not a
    /// power of two.
    pub fn new(buffer_size: usize, wait_strategy: &'w W) -> Result<Self> {
        Self::with_first_sequence(buffer_size, wait_strategy, 0)
    }

    /// Create a sequencer whose first claimed sequence will be `first`.
    ///
    /// # Errors
    /// Returns [`RingError::InvalidBufferSize`] if `buffer_size` is not a
    /// power of two.
    pub fn with_first_sequence(
        buffer_size: usize,
        wait_strategy: &'w W,
        first: Sequence,
    ) -> Result<Self> {
        if !is_power_of_two(buffer_size) {
            return Err(RingError::InvalidBufferSize(buffer_size));
        }

        let mask = buffer_size as u64 - 1;
        let published: Box<[AtomicSequence]> = (0..buffer_size as u64)
            .map(|index| {
                // First sequence at or after `first` that maps to this slot,
                // pushed one lap back.
                let seq = first.wrapping_add(index.wrapping_sub(first) & mask);
                AtomicSequence::new(seq.wrapping_sub(buffer_size as u64))
            })
            .collect();

        tracing::debug!(buffer_size, first, "multi producer sequencer created");
        Ok(Self {
            buffer_size,
            index_mask: mask,
            wait_strategy,
            claim_barrier: SequenceBarrierGroup::new(wait_strategy),
            published,
            next_claimable: CachePadded::new(AtomicSequence::new(first)),
        })
    }

    /// The number of slots in the ring this sequencer coordinates.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Register a consumer barrier as claim back-pressure. Setup-only.
    pub fn add_claim_barrier(&mut self, barrier: &'w SequenceBarrier<'w, W>) {
        self.claim_barrier.add(barrier);
    }

    /// Register every member of a barrier group as claim back-pressure.
    pub fn add_claim_barrier_group(&mut self, group: &SequenceBarrierGroup<'w, W>) {
        self.claim_barrier.add_group(group);
    }

    /// Claim a single slot, blocking until it is claimable.
    pub fn claim_one(&self) -> Sequence {
        let sequence = self.next_claimable.fetch_add(1, Ordering::Relaxed);
        self.claim_barrier
            .wait_until_published(sequence.wrapping_sub(self.buffer_size as u64));
        sequence
    }

    /// Claim up to `count` consecutive slots, blocking until they are all
    /// claimable.
    ///
    /// At most `buffer_size` slots are claimed in one call. The claim is
    /// reserved up front with a single fetch-add, so the caller is
    /// committed to publishing the returned range even though the call
    /// blocks until back-pressure clears.
    pub fn claim(&self, count: usize) -> SequenceRange {
        let count = count.min(self.buffer_size);
        let sequence = self
            .next_claimable
            .fetch_add(count as u64, Ordering::Relaxed);
        let range = SequenceRange::new(sequence, count);
        self.claim_barrier
            .wait_until_published(range.last().wrapping_sub(self.buffer_size as u64));
        range
    }

    /// Attempt to claim up to `count` slots without blocking.
    ///
    /// # Returns
    /// The claimed range (possibly shorter than requested), or `None` if
    /// the ring is full.
    pub fn try_claim(&self, count: usize) -> Option<SequenceRange> {
        let published_cap = self
            .claim_barrier
            .last_published()
            .wrapping_add(self.buffer_size as u64);

        let mut count = count;
        let mut sequence = self.next_claimable.load(Ordering::Relaxed);
        loop {
            let diff = difference(published_cap, sequence);
            if diff < 0 {
                return None;
            }
            count = count.min((diff + 1) as usize);
            match self.next_claimable.compare_exchange_weak(
                sequence,
                sequence.wrapping_add(count as u64),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(SequenceRange::new(sequence, count)),
                Err(current) => sequence = current,
            }
        }
    }

    /// Attempt to claim up to `count` slots, waiting up to `timeout`.
    pub fn try_claim_for(&self, count: usize, timeout: Duration) -> Option<SequenceRange> {
        self.try_claim_until(count, Instant::now() + timeout)
    }

    /// Attempt to claim up to `count` slots, waiting until `deadline`.
    ///
    /// # Returns
    /// The claimed range, or `None` if the deadline passed first. A
    /// timed-out attempt claims nothing.
    pub fn try_claim_until(&self, count: usize, deadline: Instant) -> Option<SequenceRange> {
        let mut published_cap = self
            .claim_barrier
            .last_published()
            .wrapping_add(self.buffer_size as u64);

        let mut count = count;
        let mut sequence = self.next_claimable.load(Ordering::Relaxed);
        loop {
            let mut diff = difference(published_cap, sequence);
            if diff < 0 {
                published_cap = self
                    .claim_barrier
                    .wait_until_published_with_deadline(
                        sequence.wrapping_sub(self.buffer_size as u64),
                        deadline,
                    )
                    .wrapping_add(self.buffer_size as u64);
                diff = difference(published_cap, sequence);
                if diff < 0 {
                    return None;
                }
            }
            count = count.min((diff + 1) as usize);
            match self.next_claimable.compare_exchange_weak(
                sequence,
                sequence.wrapping_add(count as u64),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(SequenceRange::new(sequence, count)),
                Err(current) => sequence = current,
            }
        }
    }

    /// Publish a single claimed sequence.
    ///
    /// Consumers will not observe it until every earlier sequence has also
    /// been published, but producers may commit in any order.
    pub fn publish(&self, sequence: Sequence) {
        self.set_published(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Publish every sequence in a claimed range, then signal waiters once.
    pub fn publish_range(&self, range: &SequenceRange) {
        for sequence in range.iter() {
            self.set_published(sequence);
        }
        self.wait_strategy.signal_all_when_blocking();
    }

    /// The highest sequence published contiguously after `last_known`.
    ///
    /// `last_known` must itself already be published (or be the initial
    /// sentinel). Returns `last_known` unchanged if its successor has not
    /// been published yet. This is the linearising read that turns
    /// out-of-order producer commits into an in-order consumer view.
    pub fn last_published_after(&self, last_known: Sequence) -> Sequence {
        let mut last_known = last_known;
        let mut sequence = last_known.wrapping_add(1);
        while self.is_published(sequence) {
            last_known = sequence;
            sequence = sequence.wrapping_add(1);
        }
        last_known
    }

    /// Block the calling consumer until `sequence` has been published.
    ///
    /// `last_known_published` is the consumer's previous return value from
    /// this method (initially the sentinel preceding the first sequence).
    ///
    /// # Returns
    /// The highest contiguously published sequence, guaranteed not to
    /// precede `sequence`; every slot up to it is safe to read.
    pub fn wait_until_published(
        &self,
        sequence: Sequence,
        last_known_published: Sequence,
    ) -> Sequence {
        debug_assert!(difference(sequence, last_known_published) > 0);

        let mut seq = last_known_published.wrapping_add(1);
        while difference(seq, sequence) <= 0 {
            if !self.is_published(seq) {
                let cells: [&AtomicSequence; 1] =
                    [&self.published[(seq & self.index_mask) as usize]];
                self.wait_strategy.wait_until_published(seq, &cells);
            }
            seq = seq.wrapping_add(1);
        }
        self.last_published_after(sequence)
    }

    /// Deadline form of [`wait_until_published`](Self::wait_until_published).
    ///
    /// # Returns
    /// On success, the highest contiguously published sequence at or after
    /// `sequence`. On timeout, the sequence immediately before the first
    /// gap; `difference(result, sequence) < 0` detects the timeout.
    pub fn wait_until_published_with_deadline(
        &self,
        sequence: Sequence,
        last_known_published: Sequence,
        deadline: Instant,
    ) -> Sequence {
        debug_assert!(difference(sequence, last_known_published) > 0);

        let mut seq = last_known_published.wrapping_add(1);
        while difference(seq, sequence) <= 0 {
            if !self.is_published(seq) {
                let cells: [&AtomicSequence; 1] =
                    [&self.published[(seq & self.index_mask) as usize]];
                let result =
                    self.wait_strategy
                        .wait_until_published_with_deadline(seq, &cells, deadline);
                if difference(result, seq) < 0 {
                    // seq is the first sequence not known to be published.
                    return seq.wrapping_sub(1);
                }
            }
            seq = seq.wrapping_add(1);
        }
        self.last_published_after(sequence)
    }

    /// Duration form of [`wait_until_published`](Self::wait_until_published).
    pub fn wait_until_published_with_timeout(
        &self,
        sequence: Sequence,
        last_known_published: Sequence,
        timeout: Duration,
    ) -> Sequence {
        self.wait_until_published_with_deadline(
            sequence,
            last_known_published,
            Instant::now() + timeout,
        )
    }

    fn is_published(&self, sequence: Sequence) -> bool {
        self.published[(sequence & self.index_mask) as usize].load(Ordering::Acquire) == sequence
    }

    fn set_published(&self, sequence: Sequence) {
        let entry = &self.published[(sequence & self.index_mask) as usize];
        debug_assert_eq!(
            entry.load(Ordering::Relaxed),
            sequence.wrapping_sub(self.buffer_size as u64),
            "sequence published out of claim order for its slot"
        );
        entry.store(sequence, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait_strategy::SpinWaitStrategy;
    use crate::INITIAL_CURSOR_VALUE;
    use std::thread;

    #[test]
    fn test_single_producer_rejects_non_power_of_two() {
        let strategy = SpinWaitStrategy::new();
        assert!(matches!(
            SingleProducerSequencer::new(3, &strategy),
            Err(RingError::InvalidBufferSize(3))
        ));
        assert!(SingleProducerSequencer::new(0, &strategy).is_err());
        assert!(SingleProducerSequencer::new(1, &strategy).is_ok());
    }

    #[test]
    fn test_single_producer_claims_sequentially() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = SingleProducerSequencer::new(8, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        assert_eq!(sequencer.claim_one(), 0);
        assert_eq!(sequencer.claim_one(), 1);
        let range = sequencer.claim(3);
        assert_eq!(range.first(), 2);
        assert_eq!(range.len(), 3);
    }

    #[test]
    fn test_single_producer_claim_shortens_to_available() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = SingleProducerSequencer::new(4, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        let range = sequencer.claim(16);
        assert_eq!(range.first(), 0);
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_single_producer_try_claim_honours_back_pressure() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = SingleProducerSequencer::new(4, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        for expected in 0..4 {
            let range = sequencer.try_claim(1).unwrap();
            assert_eq!(range.first(), expected);
        }
        assert!(sequencer.try_claim(1).is_none());

        // Consuming one slot frees exactly one claim.
        consumed.publish(0);
        let range = sequencer.try_claim(2).unwrap();
        assert_eq!(range.first(), 4);
        assert_eq!(range.len(), 1);
        assert!(sequencer.try_claim(1).is_none());
    }

    #[test]
    fn test_single_producer_try_claim_for_times_out_when_full() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = SingleProducerSequencer::new(4, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        for _ in 0..4 {
            sequencer.claim_one();
        }

        let start = Instant::now();
        let result = sequencer.try_claim_for(1, Duration::from_millis(100));
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_single_producer_publish_is_visible() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = SingleProducerSequencer::new(8, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        assert_eq!(sequencer.last_published(), INITIAL_CURSOR_VALUE);
        let range = sequencer.claim(3);
        sequencer.publish(range.last());
        assert_eq!(sequencer.last_published(), 2);
        assert_eq!(sequencer.wait_until_published(2), 2);
    }

    #[test]
    fn test_single_producer_blocking_claim_waits_for_consumer() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = SingleProducerSequencer::new(2, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        sequencer.claim_one();
        sequencer.claim_one();
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(5));
                consumed.publish(0);
            });
            // Blocks until the consumer releases slot 0.
            assert_eq!(sequencer.claim_one(), 2);
        });
    }

    #[test]
    fn test_multi_producer_rejects_non_power_of_two() {
        let strategy = SpinWaitStrategy::new();
        assert!(matches!(
            MultiProducerSequencer::new(12, &strategy),
            Err(RingError::InvalidBufferSize(12))
        ));
    }

    #[test]
    fn test_multi_producer_claims_partition_sequence_space() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = MultiProducerSequencer::new(8, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        assert_eq!(sequencer.claim_one(), 0);
        let range = sequencer.claim(3);
        assert_eq!(range.first(), 1);
        assert_eq!(sequencer.claim_one(), 4);
    }

    #[test]
    fn test_multi_producer_claim_caps_at_buffer_size() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = MultiProducerSequencer::new(4, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        let range = sequencer.claim(64);
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_multi_producer_out_of_order_commits_linearise() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = MultiProducerSequencer::new(8, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        let range = sequencer.claim(4);
        assert_eq!(range.first(), 0);

        // Commit 2 first; nothing is observable through the gap.
        sequencer.publish(2);
        assert_eq!(
            sequencer.last_published_after(INITIAL_CURSOR_VALUE),
            INITIAL_CURSOR_VALUE
        );

        sequencer.publish(0);
        assert_eq!(sequencer.last_published_after(INITIAL_CURSOR_VALUE), 0);

        sequencer.publish(1);
        assert_eq!(sequencer.last_published_after(INITIAL_CURSOR_VALUE), 2);

        sequencer.publish(3);
        assert_eq!(sequencer.last_published_after(2), 3);
    }

    #[test]
    fn test_multi_producer_wait_reports_contiguous_watermark() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = MultiProducerSequencer::new(8, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        let range = sequencer.claim(3);
        sequencer.publish_range(&range);

        let observed = sequencer.wait_until_published(1, INITIAL_CURSOR_VALUE);
        assert_eq!(observed, 2);
    }

    #[test]
    fn test_multi_producer_wait_timeout_stops_before_gap() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = MultiProducerSequencer::new(8, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        sequencer.claim(4);
        sequencer.publish(0);
        sequencer.publish(1);
        // Gap at 2; waiting for 3 must stop at 1.
        let observed = sequencer.wait_until_published_with_timeout(
            3,
            INITIAL_CURSOR_VALUE,
            Duration::from_millis(30),
        );
        assert_eq!(observed, 1);
        assert!(difference(observed, 3) < 0);
    }

    #[test]
    fn test_multi_producer_try_claim_honours_back_pressure() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = MultiProducerSequencer::new(4, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);

        let range = sequencer.try_claim(4).unwrap();
        assert_eq!(range.len(), 4);
        assert!(sequencer.try_claim(1).is_none());

        consumed.publish(1);
        let range = sequencer.try_claim(4).unwrap();
        assert_eq!(range.first(), 4);
        assert_eq!(range.len(), 2);
    }

    #[test]
    fn test_multi_producer_concurrent_claims_are_disjoint() {
        let strategy = SpinWaitStrategy::new();
        let consumed = SequenceBarrier::new(&strategy);
        let mut sequencer = MultiProducerSequencer::new(64, &strategy).unwrap();
        sequencer.add_claim_barrier(&consumed);
        let sequencer = &sequencer;

        let claimed: Vec<Sequence> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(move || {
                        let mut mine = Vec::new();
                        for _ in 0..8 {
                            let seq = sequencer.claim_one();
                            sequencer.publish(seq);
                            mine.push(seq);
                        }
                        mine
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let mut sorted = claimed.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 32, "claims must never overlap");
        assert_eq!(sequencer.last_published_after(INITIAL_CURSOR_VALUE), 31);
    }

    #[test]
    fn test_multi_producer_wrap_boundary() {
        let strategy = SpinWaitStrategy::new();
        let first = u64::MAX - 3;
        let consumed = SequenceBarrier::with_initial_sequence(&strategy, first.wrapping_sub(1));
        let mut sequencer =
            MultiProducerSequencer::with_first_sequence(8, &strategy, first).unwrap();
        sequencer.add_claim_barrier(&consumed);

        let range = sequencer.claim(8);
        assert_eq!(range.first(), first);
        assert_eq!(range.last(), 3);
        sequencer.publish_range(&range);

        let observed = sequencer.wait_until_published(3, first.wrapping_sub(1));
        assert_eq!(observed, 3);
    }
}
