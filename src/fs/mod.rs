//! Filesystem primitives for the rename-based store
//!
//! Everything the transaction protocol does to shared state goes through these
//! helpers. The `try_*` functions never return errors: the caller always
//! re-inspects the filesystem afterwards to learn what actually happened, since
//! another actor may have performed (or undone) the same step concurrently.
//!
//! - `nfs`: stale file handle classification for networked filesystems
//! - `area`: transaction areas (build/update/delete/preserved) and scratch dirs

pub mod area;
pub mod nfs;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::trace;
use uuid::Uuid;

pub use area::{Scratch, TxnArea, TxnOptions};

/// Try to rename `src` to `dst` atomically.
///
/// A directory may replace an existing *empty* directory; it never replaces a
/// non-empty one. The protocol relies on both behaviours.
pub fn try_rename(src: &Path, dst: &Path) -> bool {
    match fs::rename(src, dst) {
        Ok(()) => true,
        Err(e) => {
            trace!(src = %src.display(), dst = %dst.display(), error = %e, "rename refused");
            false
        }
    }
}

/// Try to keep an extra reference to `existing` at `link`.
///
/// Uses a hard link; on filesystems without hard links falls back to a copy.
pub fn try_preserve(link: &Path, existing: &Path) -> bool {
    match fs::hard_link(existing, link) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            trace!(link = %link.display(), error = %e, "hard link refused, copying instead");
            fs::copy(existing, link).is_ok()
        }
    }
}

/// Try to delete a file or an empty directory.
pub fn try_remove(path: &Path) -> bool {
    fs::remove_file(path).or_else(|_| fs::remove_dir(path)).is_ok()
}

/// Try to recursively delete a path, tolerating concurrent deleters.
///
/// Returns whether the path is gone afterwards.
pub fn try_remove_all(path: &Path) -> bool {
    remove_tree(path);
    !exists(path)
}

fn remove_tree(path: &Path) {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            if let Ok(entries) = fs::read_dir(path) {
                for entry in entries.flatten() {
                    remove_tree(&entry.path());
                }
            }
            let _ = fs::remove_dir(path);
        }
        Ok(_) => {
            let _ = fs::remove_file(path);
        }
        Err(_) => {}
    }
}

/// Remove `dir` and then each parent that became empty, like `rmdir -p`,
/// stopping before `stop`.
///
/// Unsafe in the sense that the emptiness check and the removal are one
/// `rmdir` call; a concurrent writer recreating the directory simply wins.
pub fn rmdir_parents(dir: &Path, stop: &Path) {
    let mut current = Some(dir);
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) || fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

/// Whether anything (file, dir or dangling link) exists at `path`.
pub fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Age of an entry according to its modification time.
///
/// Entries stamped in the future (clock skew between hosts) count as brand new.
pub fn age(path: &Path) -> io::Result<Duration> {
    let modified = fs::symlink_metadata(path)?.modified()?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}

/// Is an entry at least `min_age` old. Errors count as "not old".
pub fn is_older_than(path: &Path, min_age: Duration) -> bool {
    age(path).is_ok_and(|age| age >= min_age)
}

/// Are `dir` and every entry below it at least `min_age` old.
pub fn is_all_entries_older_than(dir: &Path, min_age: Duration) -> io::Result<bool> {
    if age(dir)? < min_age {
        return Ok(false);
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotADirectory => return Ok(true),
        Err(e) => return Err(e),
    };
    for entry in entries {
        if !is_all_entries_older_than(&entry?.path(), min_age)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Recursively delete up to `max` entries of `dir` that are at least
/// `min_age` old.
///
/// Returns whether every old enough entry was deleted; `false` means the
/// budget ran out and more remain.
pub fn remove_entries_older_than(dir: &Path, min_age: Duration, max: usize) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        // Missing dir: another actor removed it, and with it every entry.
        return true;
    };
    let mut budget = max;
    for entry in entries.flatten() {
        let path = entry.path();
        if is_older_than(&path, min_age) {
            if budget == 0 {
                return false;
            }
            budget -= 1;
            try_remove_all(&path);
        }
    }
    true
}

/// First entry of a directory, in whatever order the filesystem lists them.
pub fn first_dir_entry(dir: &Path) -> io::Result<Option<PathBuf>> {
    match fs::read_dir(dir)?.next() {
        Some(entry) => Ok(Some(entry?.path())),
        None => Ok(None),
    }
}

/// Read a whole UTF-8 file.
pub fn read_utf8(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

/// Write `contents` to a fresh file, optionally flushing it to stable storage.
pub fn write_utf8(path: &Path, contents: &str, sync: bool) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())?;
    if sync {
        file.sync_all()?;
    }
    Ok(())
}

/// The path `src` would have after being moved into `dir`.
pub fn reparent(src: &Path, dir: &Path) -> PathBuf {
    match src.file_name() {
        Some(name) => dir.join(name),
        None => dir.to_path_buf(),
    }
}

/// A collision free name for scratch entries.
pub fn unique_name() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rename_onto_empty_dir_only() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("payload")).unwrap();
        fs::create_dir(&dst).unwrap();

        assert!(try_rename(&src, &dst));
        assert!(dst.join("payload").is_dir());

        let other = temp.path().join("other");
        fs::create_dir(&other).unwrap();
        assert!(!try_rename(&other, &dst));
        assert!(other.exists());
    }

    #[test]
    fn test_try_remove_all() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a");
        fs::create_dir_all(dir.join("b/c")).unwrap();
        write_utf8(&dir.join("b/c/file"), "x", false).unwrap();

        assert!(try_remove_all(&dir));
        assert!(!dir.exists());
        // Already gone is still success
        assert!(try_remove_all(&dir));
    }

    #[test]
    fn test_rmdir_parents_stops_at_base() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("events");
        let leaf = base.join("3.3/001");
        fs::create_dir_all(&leaf).unwrap();

        rmdir_parents(&leaf, &base);
        assert!(!base.join("3.3").exists());
        assert!(base.exists());
    }

    #[test]
    fn test_rmdir_parents_keeps_non_empty() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("events");
        fs::create_dir_all(base.join("3.3/001")).unwrap();
        fs::create_dir_all(base.join("3.3/002")).unwrap();

        rmdir_parents(&base.join("3.3/001"), &base);
        assert!(!base.join("3.3/001").exists());
        assert!(base.join("3.3/002").exists());
    }

    #[test]
    fn test_remove_entries_older_than_respects_budget() {
        let temp = TempDir::new().unwrap();
        for i in 0..4 {
            fs::create_dir(temp.path().join(format!("entry{i}"))).unwrap();
        }

        assert!(!remove_entries_older_than(temp.path(), Duration::ZERO, 2));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 2);
        assert!(remove_entries_older_than(temp.path(), Duration::ZERO, 2));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_young_entries_survive() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("fresh")).unwrap();

        assert!(remove_entries_older_than(temp.path(), Duration::from_secs(3600), 5));
        assert!(temp.path().join("fresh").exists());
        assert!(!is_all_entries_older_than(temp.path(), Duration::from_secs(3600)).unwrap());
        assert!(is_all_entries_older_than(temp.path(), Duration::ZERO).unwrap());
    }

    #[test]
    fn test_preserve_keeps_content_after_replace() {
        let temp = TempDir::new().unwrap();
        let value = temp.path().join("value");
        let link = temp.path().join("preserved");
        let next = temp.path().join("next");
        write_utf8(&value, "1\n", false).unwrap();
        write_utf8(&next, "2\n", false).unwrap();

        assert!(try_preserve(&link, &value));
        assert!(try_rename(&next, &value));
        assert_eq!(read_utf8(&link).unwrap(), "1\n");
        assert_eq!(read_utf8(&value).unwrap(), "2\n");
    }

    #[test]
    fn test_first_dir_entry() {
        let temp = TempDir::new().unwrap();
        assert_eq!(first_dir_entry(temp.path()).unwrap(), None);
        fs::create_dir(temp.path().join("only")).unwrap();
        assert_eq!(
            first_dir_entry(temp.path()).unwrap(),
            Some(temp.path().join("only"))
        );
    }
}
