//! Store identity, written once by whichever actor gets there first.
//!
//! The id file sits inside `uuid/value/`. Every candidate writer stages a full
//! `value/` dir and renames it into place; the rename only succeeds while
//! nothing is there yet, so the first writer wins and everybody reads back the
//! same id.

use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use super::{Result, StoreError};
use crate::fs::{self, Scratch, TxnArea, TxnOptions};

const VALUE: &str = "value";

#[derive(Debug)]
pub struct FsId {
    area: TxnArea,
    dir: PathBuf,
    path: PathBuf,
}

impl FsId {
    pub fn new(base: impl Into<PathBuf>, options: TxnOptions) -> Self {
        let area = TxnArea::new(base, options);
        let dir = area.base.join(VALUE);
        let path = dir.join(VALUE);
        Self { area, dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn area(&self) -> &TxnArea {
        &self.area
    }

    /// Create the identity unless it exists, then return it.
    pub fn init(&self, max_tries: u64) -> Result<Uuid> {
        let mut tries = 0;
        while !fs::exists(&self.path) {
            if tries >= max_tries {
                return Err(StoreError::CannotAdvance {
                    path: self.path.clone(),
                    tries,
                });
            }
            tries += 1;
            let candidate = Uuid::new_v4();
            let scratch = Scratch::new(&self.area)?;
            scratch.write(VALUE, &format!("{candidate}\n"))?;
            if fs::try_rename(scratch.dir(), &self.dir) {
                info!(identity = %candidate, "Created store identity");
            }
        }
        self.spin_get(max_tries)
    }

    pub fn get(&self) -> Result<Uuid> {
        let raw = fs::read_utf8(&self.path)?;
        Ok(Uuid::parse_str(raw.trim())?)
    }

    fn spin_get(&self, max_tries: u64) -> Result<Uuid> {
        for attempt in 1..=max_tries {
            match self.get() {
                Err(e) if e.is_transient() => self.area.options().backoff.pause(attempt),
                result => return result,
            }
        }
        Err(StoreError::CannotRead {
            path: self.path.clone(),
            tries: max_tries,
        })
    }
}
