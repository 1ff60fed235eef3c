//! Event carrying sequence
//!
//! The payload rides inside the transaction. Before the transaction is closed
//! on position `n`, whoever works on it moves the payload to the entry path of
//! `n`; the commit then makes `n` visible. So an event is readable exactly
//! when its position is at or below the head.

use std::path::{Path, PathBuf};

use super::advance::{EVENT, PublishEvent};
use super::attempt::Attempt;
use super::cache::Counter;
use super::value::UpdatableValue;
use crate::fs::{TxnArea, TxnOptions};
use crate::observability::SpinSnapshot;
use crate::sharder::Sharder;
use crate::store::{Result, StoreError};

#[derive(Debug)]
pub struct EventSequence {
    value: UpdatableValue<PublishEvent>,
}

impl EventSequence {
    pub fn new(base: impl Into<PathBuf>, sharder: Sharder, options: TxnOptions) -> Self {
        Self {
            value: UpdatableValue::new(base, PublishEvent::new(sharder), options),
        }
    }

    pub fn path(&self) -> &Path {
        self.value.path()
    }

    pub fn area(&self) -> &TxnArea {
        self.value.area()
    }

    pub fn sharder(&self) -> &Sharder {
        self.value.advance().sharder()
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

    /// Append `payload` and return its position.
    ///
    /// The position is reported even when another actor finished the
    /// transaction on our behalf.
    pub fn submit(&self, payload: &str, max_tries: u64) -> Result<u64> {
        let mut staged = Some(self.value.stage(&[(EVENT, payload)])?);
        let mut tries = 0;
        let mut contention = 0;
        while tries < max_tries {
            let Some(staging) = staged.take() else {
                break;
            };

            if self.value.open(&staging) {
                let attempt = Attempt::run(&self.value, staging.into_uuid(), max_tries - tries)?;
                tries += attempt.tries.max(1);
                if attempt.committed || attempt.finished {
                    self.value.stats().updated(tries);
                    return attempt.outcome().ok_or_else(|| StoreError::Outcome {
                        uuid: attempt.uuid().to_string(),
                    });
                }
                break;
            }

            staged = Some(staging);
            contention += 1;
            match self.value.help_ongoing(max_tries - tries)? {
                Some(helped) => tries += helped.tries.max(1),
                None => {
                    tries += 1;
                    self.value.pause(contention);
                }
            }
        }
        Err(StoreError::CannotSubmit {
            path: self.path().to_path_buf(),
            tries: max_tries,
        })
    }
}

impl Counter for EventSequence {
    fn read(&self, max_tries: u64) -> Result<u64> {
        self.get(max_tries)
    }
}
