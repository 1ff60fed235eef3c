//! Transaction areas and scratch directories
//!
//! A transactional value lives in a base directory next to its bookkeeping:
//!
//! ```text
//! base/
//!   build/      scratch dirs being staged, one per actor operation
//!   update/     the single open transaction, if any
//!   delete/     entries moved aside before recursive deletion
//!   preserved/  short lived hard links to recently replaced values
//!   outcome/    values committed by helpers, kept until the initiator reads them
//! ```
//!
//! Deleting is always "rename into delete/, then remove", so a half removed
//! tree is never visible under a live name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::retry::Backoff;

pub const BUILD: &str = "build";
pub const UPDATE: &str = "update";
pub const DELETE: &str = "delete";
pub const PRESERVED: &str = "preserved";
pub const OUTCOME: &str = "outcome";

/// Timing knobs shared by everything that runs transactions.
#[derive(Debug, Clone)]
pub struct TxnOptions {
    /// Only help an open transaction once all of it is this old.
    pub help_after: Duration,
    /// Minimum time between automatic scavenger sweeps.
    pub scavenge_interval: Duration,
    /// Abandoned build/delete/outcome entries must be this old to be reclaimed.
    pub scavenge_age: Duration,
    /// Entries reclaimed per area per sweep.
    pub scavenge_batch: usize,
    /// How long preserved links outlive the value they point to.
    pub preserve_for: Duration,
    pub preserve_batch: usize,
    /// fsync staged files before publishing them.
    pub sync_writes: bool,
    pub backoff: Backoff,
}

impl Default for TxnOptions {
    fn default() -> Self {
        Self {
            help_after: Duration::from_secs(10),
            scavenge_interval: Duration::from_secs(3600),
            scavenge_age: Duration::from_secs(3600),
            scavenge_batch: 5,
            preserve_for: Duration::from_secs(1),
            preserve_batch: 5,
            sync_writes: true,
            backoff: Backoff::default(),
        }
    }
}

/// The bookkeeping dirs of one transactional value.
#[derive(Debug)]
pub struct TxnArea {
    pub base: PathBuf,
    pub build: PathBuf,
    pub update: PathBuf,
    pub delete: PathBuf,
    pub preserved: PathBuf,
    pub outcome: PathBuf,
    options: TxnOptions,
    last_scavenge: Mutex<Option<Instant>>,
}

impl TxnArea {
    pub fn new(base: impl Into<PathBuf>, options: TxnOptions) -> Self {
        let base = base.into();
        Self {
            build: base.join(BUILD),
            update: base.join(UPDATE),
            delete: base.join(DELETE),
            preserved: base.join(PRESERVED),
            outcome: base.join(OUTCOME),
            base,
            options,
            last_scavenge: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &TxnOptions {
        &self.options
    }

    /// Create the dirs every actor expects. `update/` is created by renames.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.build)?;
        fs::create_dir_all(&self.delete)?;
        fs::create_dir_all(&self.preserved)?;
        fs::create_dir_all(&self.outcome)
    }

    /// Reclaim up to `max` abandoned entries of build/, delete/ and outcome/
    /// that are at least `min_age` old. Returns whether nothing old enough
    /// remains.
    ///
    /// Outcome records outlive their initiator only when it crashed or gave up.
    pub fn scavenge(&self, min_age: Duration, max: usize) -> bool {
        let deleted = super::remove_entries_older_than(&self.delete, min_age, max);
        let built = rename_and_delete_entries_older_than(&self.build, &self.delete, min_age, max);
        let unclaimed = super::remove_entries_older_than(&self.outcome, min_age, max);
        deleted && built && unclaimed
    }

    /// Run [`TxnArea::scavenge`] with the configured age when the sweep
    /// interval has elapsed since the last complete sweep.
    pub fn auto_scavenge(&self) {
        let due = {
            let last = self
                .last_scavenge
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            last.is_none_or(|at| at.elapsed() >= self.options.scavenge_interval)
        };
        if !due {
            return;
        }

        if self.scavenge(self.options.scavenge_age, self.options.scavenge_batch) {
            debug!(base = %self.base.display(), "Scavenged abandoned transaction entries");
            let mut last = self
                .last_scavenge
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *last = Some(Instant::now());
        }
    }

    /// Drop preserved links that outlived their purpose.
    pub fn clean_preserved(&self) {
        super::remove_entries_older_than(
            &self.preserved,
            self.options.preserve_for,
            self.options.preserve_batch,
        );
    }
}

/// Move `src` into `delete` under a unique parent, then remove it.
///
/// For names that may collide with other deletions (scratch dirs).
pub fn rename_and_delete(src: &Path, delete: &Path) {
    if !super::exists(src) {
        return;
    }
    let holder = delete.join(super::unique_name());
    if fs::create_dir(&holder).is_err() {
        return;
    }
    super::try_rename(src, &super::reparent(src, &holder));
    super::try_remove_all(&holder);
}

/// Move `src` into `delete` under its own name, then remove it.
///
/// For globally unique names; concurrent callers agree on the destination.
pub fn rename_and_delete_unique(src: &Path, delete: &Path) {
    let moved = super::reparent(src, delete);
    super::try_rename(src, &moved);
    super::try_remove_all(&moved);
}

fn rename_and_delete_entries_older_than(
    dir: &Path,
    delete: &Path,
    min_age: Duration,
    max: usize,
) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return true;
    };
    let mut budget = max;
    for entry in entries.flatten() {
        let path = entry.path();
        if super::is_older_than(&path, min_age) {
            if budget == 0 {
                return false;
            }
            budget -= 1;
            rename_and_delete(&path, delete);
        }
    }
    true
}

/// A private staging dir under build/.
///
/// Whatever is still in the scratch dir when it is dropped gets deleted, and
/// dropping one is also what drives the periodic scavenger.
#[derive(Debug)]
pub struct Scratch<'a> {
    area: &'a TxnArea,
    dir: PathBuf,
}

impl<'a> Scratch<'a> {
    pub fn new(area: &'a TxnArea) -> io::Result<Self> {
        area.ensure_dirs()?;
        let dir = area.build.join(super::unique_name());
        fs::create_dir(&dir)?;
        Ok(Self { area, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a file relative to the scratch dir.
    pub fn write(&self, relative: impl AsRef<Path>, contents: &str) -> io::Result<()> {
        super::write_utf8(
            &self.dir.join(relative),
            contents,
            self.area.options.sync_writes,
        )
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        rename_and_delete(&self.dir, &self.area.delete);
        self.area.auto_scavenge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_area(temp: &TempDir) -> TxnArea {
        let options = TxnOptions {
            sync_writes: false,
            ..TxnOptions::default()
        };
        TxnArea::new(temp.path().join("seq"), options)
    }

    #[test]
    fn test_scratch_removed_on_drop() {
        let temp = TempDir::new().unwrap();
        let area = create_test_area(&temp);

        let dir = {
            let scratch = Scratch::new(&area).unwrap();
            scratch.write("file", "contents").unwrap();
            assert!(scratch.dir().join("file").exists());
            scratch.dir().to_path_buf()
        };
        assert!(!dir.exists());
        assert_eq!(fs::read_dir(&area.delete).unwrap().count(), 0);
    }

    #[test]
    fn test_moved_scratch_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let area = create_test_area(&temp);

        {
            let scratch = Scratch::new(&area).unwrap();
            scratch.write("init", "0\n").unwrap();
            assert!(crate::fs::try_rename(scratch.dir(), &area.update));
        }
        assert!(area.update.join("init").exists());
    }

    #[test]
    fn test_scavenge_reclaims_abandoned_entries() {
        let temp = TempDir::new().unwrap();
        let area = create_test_area(&temp);
        area.ensure_dirs().unwrap();
        fs::create_dir_all(area.build.join("crashed/nested")).unwrap();
        fs::create_dir_all(area.delete.join("half-deleted")).unwrap();
        fs::write(area.outcome.join("unclaimed-uuid"), "3\n").unwrap();

        // Too young to be abandoned
        assert!(area.scavenge(Duration::from_secs(3600), 5));
        assert!(area.build.join("crashed").exists());
        assert!(area.delete.join("half-deleted").exists());
        assert!(area.outcome.join("unclaimed-uuid").exists());

        assert!(area.scavenge(Duration::ZERO, 5));
        assert!(!area.build.join("crashed").exists());
        assert!(!area.outcome.join("unclaimed-uuid").exists());
        assert_eq!(fs::read_dir(&area.delete).unwrap().count(), 0);
    }

    #[test]
    fn test_rename_and_delete_unique() {
        let temp = TempDir::new().unwrap();
        let area = create_test_area(&temp);
        area.ensure_dirs().unwrap();
        let txn = area.update.join("some-uuid");
        fs::create_dir_all(txn.join("next/closed")).unwrap();

        rename_and_delete_unique(&txn, &area.delete);
        assert!(!txn.exists());
        assert!(!area.delete.join("some-uuid").exists());
    }
}
