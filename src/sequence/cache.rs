//! Monotonic cache in front of a sequence.
//!
//! Sequences only ever grow, so a value observed once is a lower bound
//! forever. Comparisons the lower bound already decides skip the filesystem.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::Result;

/// Anything with a readable, never decreasing value.
pub trait Counter {
    fn read(&self, max_tries: u64) -> Result<u64>;
}

#[derive(Debug)]
pub struct SequenceCache<S> {
    sequence: S,
    cached: AtomicU64,
    max_tries: u64,
}

impl<S: Counter> SequenceCache<S> {
    pub fn new(sequence: S, max_tries: u64) -> Self {
        Self {
            sequence,
            cached: AtomicU64::new(0),
            max_tries,
        }
    }

    pub fn sequence(&self) -> &S {
        &self.sequence
    }

    /// Last observed value, without touching the sequence.
    pub fn cached(&self) -> u64 {
        self.cached.load(Ordering::Acquire)
    }

    /// Record a value learned elsewhere; returns the new lower bound.
    pub fn observe(&self, value: u64) -> u64 {
        self.cached.fetch_max(value, Ordering::AcqRel).max(value)
    }

    /// Fresh read of the sequence.
    pub fn get(&self) -> Result<u64> {
        let value = self.sequence.read(self.max_tries)?;
        Ok(self.observe(value))
    }

    pub fn is_greater_than(&self, n: u64) -> Result<bool> {
        Ok(self.cached() > n || self.get()? > n)
    }

    pub fn is_greater_than_or_equal(&self, n: u64) -> Result<bool> {
        Ok(self.cached() >= n || self.get()? >= n)
    }

    pub fn is_less_than(&self, n: u64) -> Result<bool> {
        Ok(self.cached() < n && self.get()? < n)
    }

    pub fn is_less_than_or_equal(&self, n: u64) -> Result<bool> {
        Ok(self.cached() <= n && self.get()? <= n)
    }
}
