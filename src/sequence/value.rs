//! A numeric value file advanced only through rename transactions
//!
//! The value lives at `base/value` as decimal text. Nothing ever writes it in
//! place: a new value is staged elsewhere and renamed over the old one, so any
//! reader sees either the old or the new contents in full.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use super::advance::Advance;
use super::attempt::Attempt;
use crate::fs::{self, Scratch, TxnArea, TxnOptions, nfs};
use crate::observability::SpinStats;
use crate::store::{Result, StoreError};

pub(crate) const VALUE: &str = "value";
pub(crate) const NEXT: &str = "next";
pub(crate) const CLOSED: &str = "closed";
const INIT: &str = "init";

pub(crate) fn encode(value: u64) -> String {
    format!("{value}\n")
}

pub(crate) fn parse(path: &Path, raw: &str) -> Result<u64> {
    raw.trim().parse().map_err(|_| StoreError::Corrupt {
        path: path.to_path_buf(),
        value: raw.to_string(),
    })
}

/// A transaction staged under build/ that has not been opened yet.
pub(crate) struct Staged<'a> {
    scratch: Scratch<'a>,
    uuid: String,
}

impl Staged<'_> {
    /// Forget the staging dir once it was renamed into place.
    pub(crate) fn into_uuid(self) -> String {
        self.uuid
    }
}

#[derive(Debug)]
pub struct UpdatableValue<A> {
    area: TxnArea,
    path: PathBuf,
    advance: A,
    stats: SpinStats,
}

impl<A: Advance> UpdatableValue<A> {
    pub fn new(base: impl Into<PathBuf>, advance: A, options: TxnOptions) -> Self {
        let area = TxnArea::new(base, options);
        let path = area.base.join(VALUE);
        Self {
            area,
            path,
            advance,
            stats: SpinStats::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn area(&self) -> &TxnArea {
        &self.area
    }

    pub fn stats(&self) -> &SpinStats {
        &self.stats
    }

    pub(crate) fn advance(&self) -> &A {
        &self.advance
    }

    /// Create the value with `initial` unless some actor already did.
    ///
    /// The initial value is staged as `update/init` so that two initializers
    /// never both create a value, and a crashed initializer's staged value is
    /// finished by whoever comes next.
    pub fn init(&self, initial: u64, max_tries: u64) -> Result<()> {
        self.area.ensure_dirs()?;
        let init = self.area.update.join(INIT);
        let mut tries = 0;
        while !fs::exists(&self.path) {
            if tries >= max_tries {
                return Err(StoreError::CannotAdvance {
                    path: self.path.clone(),
                    tries,
                });
            }
            tries += 1;
            {
                let scratch = Scratch::new(&self.area)?;
                scratch.write(INIT, &encode(initial))?;
                fs::try_rename(scratch.dir(), &self.area.update);
            }
            if !fs::exists(&self.path) && fs::try_rename(&init, &self.path) {
                info!(path = %self.path.display(), initial, "Initialized sequence");
            }
        }
        fs::try_remove(&init);
        Ok(())
    }

    /// Read the committed value once.
    pub fn get(&self) -> Result<u64> {
        let raw = fs::read_utf8(&self.path)?;
        parse(&self.path, &raw)
    }

    /// Read the committed value, retrying transient errors.
    pub fn spin_get(&self, max_tries: u64) -> Result<u64> {
        for attempt in 1..=max_tries {
            match self.get() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    self.stats.stale_read();
                    debug!(path = %self.path.display(), error = %e, "Retrying read");
                    self.pause(attempt);
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::CannotRead {
            path: self.path.clone(),
            tries: max_tries,
        })
    }

    /// Phase 0: stage a transaction dir holding `files` under build/.
    pub(crate) fn stage(&self, files: &[(&str, &str)]) -> Result<Staged<'_>> {
        let scratch = Scratch::new(&self.area)?;
        let uuid = Uuid::new_v4().to_string();
        let txn = Path::new(&uuid);
        std::fs::create_dir_all(scratch.dir().join(txn).join(NEXT))?;
        for (name, contents) in files {
            scratch.write(txn.join(name), contents)?;
        }
        Ok(Staged { scratch, uuid })
    }

    /// Phase 1: try to make the staged transaction the open one.
    pub(crate) fn open(&self, staged: &Staged<'_>) -> bool {
        fs::try_rename(staged.scratch.dir(), &self.area.update)
    }

    /// Help finish the open transaction if it looks abandoned.
    pub(crate) fn help_ongoing(&self, max_tries: u64) -> Result<Option<Attempt<'_, A>>> {
        let Some(uuid) = self.stale_transaction()? else {
            return Ok(None);
        };
        debug!(uuid = %uuid, path = %self.path.display(), "Helping stale transaction");
        self.stats.helped();
        Attempt::help(self, uuid, max_tries).map(Some)
    }

    fn stale_transaction(&self) -> Result<Option<String>> {
        let help_after = self.area.options().help_after;
        if !nfs::is_all_entries_older_than(&self.area.update, help_after) {
            return Ok(None);
        }
        let Some(entry) = nfs::first_dir_entry(&self.area.update)? else {
            return Ok(None);
        };
        if !entry.is_dir() {
            return Ok(None);
        }
        Ok(entry
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| *name != INIT)
            .map(str::to_string))
    }

    /// Phase 5: rename a proposal over the value.
    pub(crate) fn replace(&self, proposal: &Path) -> bool {
        fs::try_rename(proposal, &self.path)
    }

    /// Keep a link to a proposal that is about to become the value.
    pub(crate) fn preserve(&self, uuid: &str, proposal: &Path) -> bool {
        fs::try_preserve(&self.area.preserved.join(uuid), proposal)
    }

    /// Keep the proposal of transaction `uuid` for its initiator to claim.
    pub(crate) fn record_outcome(&self, uuid: &str, proposal: &Path) -> bool {
        fs::try_preserve(&self.area.outcome.join(uuid), proposal)
    }

    /// Claim what a helper recorded for transaction `uuid`, if anything.
    pub(crate) fn take_outcome(&self, uuid: &str) -> Option<u64> {
        let path = self.area.outcome.join(uuid);
        let recorded = fs::read_utf8(&path)
            .ok()
            .and_then(|raw| parse(&path, &raw).ok());
        fs::try_remove(&path);
        recorded
    }

    /// The value committed by transaction `uuid`, while its link is kept.
    pub(crate) fn preserved_value(&self, uuid: &str) -> Option<u64> {
        let path = self.area.preserved.join(uuid);
        let raw = fs::read_utf8(&path).ok()?;
        parse(&path, &raw).ok()
    }

    pub(crate) fn pause(&self, attempt: u64) {
        self.area.options().backoff.pause(attempt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{Increment, test_options};
    use tempfile::TempDir;

    fn create_test_value(temp: &TempDir) -> UpdatableValue<Increment> {
        UpdatableValue::new(temp.path().join("seq"), Increment, test_options())
    }

    #[test]
    fn test_init_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let value = create_test_value(&temp);

        value.init(1, 10).unwrap();
        value.init(5, 10).unwrap();
        assert_eq!(value.get().unwrap(), 1);
        assert_eq!(fs::read_utf8(value.path()).unwrap(), "1\n");
        assert!(!value.area().update.join(INIT).exists());
    }

    #[test]
    fn test_init_finishes_crashed_initializer() {
        let temp = TempDir::new().unwrap();
        let value = create_test_value(&temp);
        std::fs::create_dir_all(&value.area().update).unwrap();
        fs::write_utf8(&value.area().update.join(INIT), "7\n", false).unwrap();

        value.init(1, 10).unwrap();
        assert_eq!(value.get().unwrap(), 7);
    }

    #[test]
    fn test_corrupt_value() {
        let temp = TempDir::new().unwrap();
        let value = create_test_value(&temp);
        value.init(0, 10).unwrap();
        fs::write_utf8(value.path(), "garbage", false).unwrap();

        assert!(matches!(value.get(), Err(StoreError::Corrupt { .. })));
        assert!(matches!(value.spin_get(3), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_missing_value_exhausts_reads() {
        let temp = TempDir::new().unwrap();
        let value = create_test_value(&temp);

        assert!(matches!(
            value.spin_get(3),
            Err(StoreError::CannotRead { tries: 3, .. })
        ));
        assert_eq!(value.stats().snapshot().stale_reads, 3);
    }

    #[test]
    fn test_young_transaction_is_not_helped() {
        let temp = TempDir::new().unwrap();
        let value = create_test_value(&temp);
        value.init(0, 10).unwrap();

        let staged = value.stage(&[]).unwrap();
        assert!(value.open(&staged));
        assert!(value.help_ongoing(10).unwrap().is_none());
    }
}
