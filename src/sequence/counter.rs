//! Plain sequence
//!
//! Each successful increment commits exactly one `+1`. A commit performed
//! while helping someone else's transaction counts as the helper's own
//! increment; the initiator of that transaction simply tries again.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::advance::{CEILING, Increment};
use super::attempt::Attempt;
use super::cache::Counter;
use super::value::{UpdatableValue, encode};
use crate::fs::{TxnArea, TxnOptions};
use crate::observability::SpinSnapshot;
use crate::store::{Result, StoreError};

#[derive(Debug)]
pub struct Sequence {
    value: UpdatableValue<Increment>,
}

impl Sequence {
    pub fn new(base: impl Into<PathBuf>, options: TxnOptions) -> Self {
        Self {
            value: UpdatableValue::new(base, Increment, options),
        }
    }

    pub fn path(&self) -> &Path {
        self.value.path()
    }

    pub fn area(&self) -> &TxnArea {
        self.value.area()
    }

    pub fn stats(&self) -> SpinSnapshot {
        self.value.stats().snapshot()
    }

    pub fn init(&self, initial: u64, max_tries: u64) -> Result<()> {
        self.value.init(initial, max_tries)
    }

    pub fn get(&self, max_tries: u64) -> Result<u64> {
        self.value.spin_get(max_tries)
    }

    /// Add one and return the new value.
    pub fn increment(&self, max_tries: u64) -> Result<u64> {
        self.advance(None, max_tries)?
            .ok_or_else(|| StoreError::CannotAdvance {
                path: self.path().to_path_buf(),
                tries: max_tries,
            })
    }

    /// Add one unless the value already reached `ceiling`.
    ///
    /// Returns `None` when the value is at or above the ceiling.
    pub fn increment_below(&self, ceiling: u64, max_tries: u64) -> Result<Option<u64>> {
        self.advance(Some(ceiling), max_tries)
    }

    fn advance(&self, ceiling: Option<u64>, max_tries: u64) -> Result<Option<u64>> {
        let ceiling = ceiling.map(encode);
        let files: Vec<(&str, &str)> = ceiling.iter().map(|c| (CEILING, c.as_str())).collect();

        let mut staged = None;
        let mut tries = 0;
        let mut contention = 0;
        while tries < max_tries {
            let staging = match staged.take() {
                Some(staging) => staging,
                None => self.value.stage(&files)?,
            };

            if self.value.open(&staging) {
                let attempt = Attempt::run(&self.value, staging.into_uuid(), max_tries - tries)?;
                tries += attempt.tries.max(1);
                if attempt.my_commit {
                    self.value.stats().updated(tries);
                    return committed(&attempt).map(Some);
                }
                if attempt.abandoned {
                    return Ok(None);
                }
                debug!(uuid = attempt.uuid(), "Transaction usurped, retrying");
                continue;
            }

            staged = Some(staging);
            contention += 1;
            match self.value.help_ongoing(max_tries - tries)? {
                Some(helped) => {
                    tries += helped.tries.max(1);
                    if helped.my_commit {
                        self.value.stats().updated(tries);
                        return committed(&helped).map(Some);
                    }
                }
                None => {
                    tries += 1;
                    self.value.pause(contention);
                }
            }
        }
        Err(StoreError::CannotAdvance {
            path: self.path().to_path_buf(),
            tries: max_tries,
        })
    }
}

fn committed(attempt: &Attempt<'_, Increment>) -> Result<u64> {
    attempt.outcome().ok_or_else(|| StoreError::Outcome {
        uuid: attempt.uuid().to_string(),
    })
}

impl Counter for Sequence {
    fn read(&self, max_tries: u64) -> Result<u64> {
        self.get(max_tries)
    }
}
