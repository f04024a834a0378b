//! # Sequence Allocator
//!
//! Display sequence numbers are allocated from the local snapshot only. Two
//! clients posting before either observes the other's write can allocate the
//! same number; that degrades display ordering, never data.

use al_core::Message;

/// `max(sequence_number) + 1` over what this client currently knows, or 1.
pub fn next_sequence<'a, I>(known: I) -> u64
where
    I: IntoIterator<Item = &'a Message>,
{
    known.into_iter().map(|m| m.sequence_number).max().unwrap_or(0) + 1
}
