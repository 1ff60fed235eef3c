//! Counters advanced through the rename transaction protocol
//!
//! - `value`: the transactional value file and its bookkeeping area
//! - `attempt`: one actor's pass through the transaction phases
//! - `advance`: strategies deciding the next value (plain or event carrying)
//! - `counter`: the plain sequence, used for the tail
//! - `event`: the event carrying sequence, used for the head
//! - `cache`: monotonic in-process cache in front of a sequence

mod attempt;

pub mod advance;
pub mod cache;
pub mod counter;
pub mod event;
pub mod value;

pub use advance::{Advance, Increment, PublishEvent};
pub use cache::{Counter, SequenceCache};
pub use counter::Sequence;
pub use event::EventSequence;
pub use value::UpdatableValue;

#[cfg(test)]
pub(crate) fn test_options() -> crate::fs::TxnOptions {
    crate::fs::TxnOptions {
        sync_writes: false,
        ..crate::fs::TxnOptions::default()
    }
}
