//! Strategies for the value a transaction proposes.
//!
//! While a transaction is open the committed value cannot change, so every
//! actor working on it computes the same proposal from the same inputs: the
//! current value and the files staged inside the transaction.

use std::io;
use std::path::Path;

use tracing::warn;

use super::value::parse;
use crate::fs;
use crate::sharder::Sharder;
use crate::store::Result;

/// Staged in bounded transactions; the value never advances past it.
pub const CEILING: &str = "ceiling";
/// Staged in event transactions; the payload to publish.
pub const EVENT: &str = "event";

pub trait Advance: Send + Sync {
    /// The value to propose for the open transaction at `txn`, or `None` when
    /// the transaction must not advance at all.
    fn next(&self, txn: &Path, current: u64) -> Result<Option<u64>>;

    /// Side effect to complete before proposing `next`.
    ///
    /// Returns `false` while it is still pending; the caller retries.
    fn publish(&self, _txn: &Path, _next: u64) -> bool {
        true
    }
}

/// Adds one, honouring an optional staged ceiling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Increment;

impl Advance for Increment {
    fn next(&self, txn: &Path, current: u64) -> Result<Option<u64>> {
        let Some(next) = current.checked_add(1) else {
            return Ok(None);
        };
        let ceiling = txn.join(CEILING);
        match fs::read_utf8(&ceiling) {
            Ok(raw) => Ok((current < parse(&ceiling, &raw)?).then_some(next)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Some(next)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Adds one and moves the staged payload to the new position's entry.
#[derive(Debug, Clone)]
pub struct PublishEvent {
    sharder: Sharder,
}

impl PublishEvent {
    pub fn new(sharder: Sharder) -> Self {
        Self { sharder }
    }

    pub fn sharder(&self) -> &Sharder {
        &self.sharder
    }
}

impl Advance for PublishEvent {
    fn next(&self, _txn: &Path, current: u64) -> Result<Option<u64>> {
        Ok(current.checked_add(1))
    }

    fn publish(&self, txn: &Path, next: u64) -> bool {
        let event = txn.join(EVENT);
        if !fs::exists(&event) {
            return true;
        }
        let destination = self.sharder.path(next);
        if let Some(dir) = destination.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!(dir = %dir.display(), error = %e, "Failed to create event directory");
            }
        }
        fs::try_rename(&event, &destination);
        !fs::exists(&event)
    }
}
