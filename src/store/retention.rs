/// Retention: advancing the tail and deleting what it leaves behind
use serde::Serialize;
use tracing::debug;

use super::Result;
use crate::fs;
use crate::sequence::{Sequence, SequenceCache};
use crate::sharder::Sharder;

/// Outcome of one trim call
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TrimStats {
    /// Entries this caller deleted
    pub removed: u64,
    /// Tail observed when done
    pub tail: u64,
}

/// Target of "keep only the newest `size` entries".
pub fn keep_newest(head: u64, size: u64) -> u64 {
    head.saturating_sub(size)
}

/// Advance the tail until it reaches `ceiling`, deleting each vacated entry.
///
/// Every step is a bounded increment, so concurrent trimmers can interleave
/// freely without pushing the tail past any of their ceilings.
pub(crate) fn advance_tail(
    tail: &SequenceCache<Sequence>,
    sharder: &Sharder,
    ceiling: u64,
    max_tries: u64,
) -> Result<TrimStats> {
    let mut stats = TrimStats::default();
    while !tail.is_greater_than_or_equal(ceiling)? {
        match tail.sequence().increment_below(ceiling, max_tries)? {
            Some(new_tail) => {
                tail.observe(new_tail);
                remove_entry(sharder, new_tail.saturating_sub(1));
                stats.removed += 1;
            }
            None => break,
        }
    }
    stats.tail = tail.cached();
    Ok(stats)
}

/// Delete the entry at `position`; prune its directory once it is finished.
fn remove_entry(sharder: &Sharder, position: u64) {
    let path = sharder.path(position);
    if !fs::try_remove_all(&path) {
        debug!(position, "Entry still present after delete");
    }
    if sharder.is_last_dir_entry(position) {
        if let Some(dir) = path.parent() {
            fs::rmdir_parents(dir, sharder.base());
        }
    }
}
