//! Aggregated view over several sequence barriers.

use std::time::{Duration, Instant};

use crate::sequence::{difference, minimum_sequence, minimum_sequence_after, AtomicSequence, Sequence};
use crate::sequence_barrier::SequenceBarrier;
use crate::wait_strategy::WaitStrategy;

/// A group of sequence barriers that is only as advanced as its slowest
/// member.
///
/// A consumer that depends on several upstream consumers waits on a group
/// instead of a single barrier; producers register a group of consumer
/// barriers as their claim back-pressure. The group holds borrowed
/// pointers to each member's atomic cursor cell, so the wait loop reads
/// the cells through a single indirection with no virtual calls.
///
/// Membership may only change during single-threaded setup, before the
/// group is shared between threads; this is enforced by `add` taking
/// `&mut self`.
#[derive(Debug)]
pub struct SequenceBarrierGroup<'w, W: WaitStrategy> {
    wait_strategy: &'w W,
    sequences: Vec<&'w AtomicSequence>,
}

impl<'w, W: WaitStrategy> SequenceBarrierGroup<'w, W> {
    /// Create an empty group.
    ///
    /// At least one barrier must be added before the group is waited on.
    pub fn new(wait_strategy: &'w W) -> Self {
        Self {
            wait_strategy,
            sequences: Vec::new(),
        }
    }

    /// Add a barrier to the group.
    ///
    /// # Panics
    /// Panics if `barrier` was built with a different wait strategy
    /// instance than this group; waiters parked by the group's strategy
    /// would otherwise never be woken by the member's publishes.
    pub fn add(&mut self, barrier: &'w SequenceBarrier<'w, W>) {
        assert!(
            std::ptr::eq(self.wait_strategy, barrier.wait_strategy()),
            "barrier and group must share one wait strategy instance"
        );
        tracing::trace!(members = self.sequences.len() + 1, "barrier added to group");
        self.sequences.push(barrier.cell());
    }

    /// Add every member of another group to this group.
    pub fn add_group(&mut self, group: &SequenceBarrierGroup<'w, W>) {
        self.sequences.extend_from_slice(&group.sequences);
    }

    /// Number of member barriers.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// The sequence of the least-advanced member barrier.
    ///
    /// # Panics
    /// Panics if the group is empty.
    pub fn last_published(&self) -> Sequence {
        assert!(!self.is_empty(), "waited on an empty barrier group");
        minimum_sequence(&self.sequences)
    }

    /// Block until every member has published at least `sequence`.
    ///
    /// # Returns
    /// The sequence of the least-advanced member, guaranteed not to
    /// precede `sequence`.
    ///
    /// # Panics
    /// Panics if the group is empty.
    pub fn wait_until_published(&self, sequence: Sequence) -> Sequence {
        assert!(!self.is_empty(), "waited on an empty barrier group");

        let current = minimum_sequence_after(sequence, &self.sequences);
        if difference(current, sequence) >= 0 {
            return current;
        }
        self.wait_strategy
            .wait_until_published(sequence, &self.sequences)
    }

    /// Block until every member has published at least `sequence`, or
    /// until `deadline` has passed.
    ///
    /// # Returns
    /// The sequence of the least-advanced member. If
    /// `difference(result, sequence) < 0` the wait timed out.
    ///
    /// # Panics
    /// Panics if the group is empty.
    pub fn wait_until_published_with_deadline(
        &self,
        sequence: Sequence,
        deadline: Instant,
    ) -> Sequence {
        assert!(!self.is_empty(), "waited on an empty barrier group");

        let current = minimum_sequence_after(sequence, &self.sequences);
        if difference(current, sequence) >= 0 {
            return current;
        }
        self.wait_strategy
            .wait_until_published_with_deadline(sequence, &self.sequences, deadline)
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
}
