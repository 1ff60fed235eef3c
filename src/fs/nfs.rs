//! Error classification for networked filesystems.
//!
//! NFS clients report `ESTALE` when a file they had a handle on was replaced
//! or deleted by another host. For the store that is a normal side effect of a
//! concurrent rename, so reads retry instead of failing.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Whether an error is a stale file handle.
pub fn is_stale_handle(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::StaleNetworkFileHandle {
        return true;
    }
    // Some clients only surface it through the message.
    let message = err.to_string().to_lowercase();
    match message.find("stale") {
        Some(at) => {
            let rest = &message[at..];
            rest.find("file")
                .is_some_and(|file| rest[file..].contains("handle"))
        }
        None => false,
    }
}

/// Whether a failed read of a value file should be retried.
///
/// A replaced value can be momentarily invisible on a replica, so `NotFound`
/// counts as transient as well.
pub fn is_transient_read(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound || is_stale_handle(err)
}

/// Like [`super::is_all_entries_older_than`], treating any error as "no".
pub fn is_all_entries_older_than(dir: &Path, min_age: Duration) -> bool {
    super::is_all_entries_older_than(dir, min_age).unwrap_or(false)
}

/// Like [`super::first_dir_entry`], treating a vanished or stale dir as empty.
pub fn first_dir_entry(dir: &Path) -> io::Result<Option<PathBuf>> {
    match super::first_dir_entry(dir) {
        Ok(entry) => Ok(entry),
        Err(e) if e.kind() == io::ErrorKind::NotFound || is_stale_handle(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_kind() {
        let err = io::Error::from(io::ErrorKind::StaleNetworkFileHandle);
        assert!(is_stale_handle(&err));
        assert!(is_transient_read(&err));
    }

    #[test]
    fn test_stale_message() {
        let err = io::Error::other("Stale NFS file handle");
        assert!(is_stale_handle(&err));

        let err = io::Error::other("file handle is stale");
        assert!(!is_stale_handle(&err));
    }

    #[test]
    fn test_other_errors_are_not_transient() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(!is_stale_handle(&err));
        assert!(!is_transient_read(&err));
        assert!(is_transient_read(&io::Error::from(io::ErrorKind::NotFound)));
    }

    #[test]
    fn test_missing_dir_has_no_entries() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        assert_eq!(first_dir_entry(&missing).unwrap(), None);
        assert!(!is_all_entries_older_than(&missing, Duration::ZERO));
    }
}
