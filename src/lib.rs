//! `seqring` - Disruptor-style sequenced ring coordination
//!
//! An in-process concurrent queue toolkit built around the disruptor
//! pattern: a power-of-two ring buffer of pre-allocated slots, coordinated
//! by monotonically increasing sequence numbers and pluggable wait
//! strategies. Producers claim contiguous sequence ranges, write the
//! addressed slots in place, and publish; consumers observe published
//! sequences in order, process batches, and feed back-pressure through
//! sequence barriers. The hot path is free of heap allocation and locks,
//! using only atomic loads and stores with acquire/release ordering (plus
//! one fetch-add for the multi-producer claim).
//!
//! ## Features
//!
//! - **Single- and multi-producer claim strategies** with blocking,
//!   non-blocking and deadline-bounded claim operations
//! - **Wait-free multi-producer commit**: one relaxed fetch-add partitions
//!   the sequence space; out-of-order commits are linearised on the
//!   consumer side through a per-slot publication map
//! - **Pluggable wait strategies** resolved at compile time: busy-spin
//!   with phased back-off, or condition-variable blocking
//! - **Fan-out and dependency graphs** through sequence barriers and
//!   barrier groups gated on the slowest member
//! - **Wrap-safe sequencing** across the full 64-bit counter range
//!
//! ## Quick start
//!
//! ```rust
//! use seqring::{
//!     difference, RingBuffer, SequenceBarrier, SingleProducerSequencer, SpinWaitStrategy,
//! };
//!
//! let wait_strategy = SpinWaitStrategy::new();
//! let consumed = SequenceBarrier::new(&wait_strategy);
//! let mut sequencer = SingleProducerSequencer::new(8, &wait_strategy).unwrap();
//! sequencer.add_claim_barrier(&consumed);
//! let buffer = RingBuffer::<u64>::new(8).unwrap();
//!
//! // Producer side: claim, write the slot, publish.
//! for value in 0..4u64 {
//!     let seq = sequencer.claim_one();
//!     unsafe { *buffer.get_unchecked_mut(seq) = value * 10 };
//!     sequencer.publish(seq);
//! }
//!
//! // Consumer side: wait, drain the batch, release the slots.
//! let mut next = 0u64;
//! let mut sum = 0u64;
//! let available = sequencer.wait_until_published(next);
//! while difference(next, available) <= 0 {
//!     sum += *buffer.get(next);
//!     next = next.wrapping_add(1);
//! }
//! consumed.publish(available);
//! assert_eq!(sum, 60);
//! ```
//!
//! In a real pipeline the producer and consumer loops run on separate
//! threads; every coordination type is shareable by reference once setup
//! is complete. The wait strategy and the consumer barriers are borrowed,
//! so a surrounding scope (for example [`std::thread::scope`]) must keep
//! them alive for as long as any sequencer or group uses them.

pub mod barrier_group;
pub mod ring_buffer;
pub mod sequence;
pub mod sequence_barrier;
pub mod sequencer;
pub mod spin_wait;
pub mod wait_strategy;


pub use barrier_group::SequenceBarrierGroup;
pub use ring_buffer::RingBuffer;
pub use sequence::{
    difference, minimum_sequence, minimum_sequence_after, AtomicSequence, Sequence, SequenceDiff,
    SequenceRange,
};
pub use sequence_barrier::SequenceBarrier;
pub use sequencer::{MultiProducerSequencer, SingleProducerSequencer};
pub use spin_wait::SpinWait;
pub use wait_strategy::{BlockingWaitStrategy, SpinWaitStrategy, WaitStrategy};

/// The sequence value meaning "nothing published yet".
///
/// It precedes sequence zero under [`difference`], so the first published
/// sequence is observed as an advance. Consumers start their observation
/// loops from this value.
pub const INITIAL_CURSOR_VALUE: Sequence = Sequence::MAX;

/// Errors that can occur while constructing ring components.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error("buffer size must be a power of 2, got: {0}")]
    InvalidBufferSize(usize),
}

pub type Result<T> = std::result::Result<T, RingError>;

/// Utility function to check if a number is a power of 2.
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of the `seqring` library
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
