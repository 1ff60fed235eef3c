//! Maps event positions onto a directory tree that grows as the log does.
//!
//! With order `k` each directory holds at most `10^k` entries. Small positions
//! live directly in `base/k`, larger ones in deeper subtrees named after their
//! depth (`base/k.k/...`, `base/k.k.k/...`), so the layout never needs
//! rebalancing and the depth of an entry is visible from its path.
//!
//! ```text
//! order 3:      42 -> base/3/42
//!             1000 -> base/3.3/001/1000
//!          1001000 -> base/3.3.3/001/001/1001000
//! ```

use std::path::{Path, PathBuf};

pub const DEFAULT_ORDER: u32 = 3;
/// Largest order whose level size still fits in a `u64`.
pub const MAX_ORDER: u32 = 19;

#[derive(Debug, Clone)]
pub struct Sharder {
    base: PathBuf,
    order: u32,
    entries_per_level: u64,
    order_name: String,
}

impl Sharder {
    /// Orders outside `1..=MAX_ORDER` are clamped into range.
    pub fn new(base: impl Into<PathBuf>, order: u32) -> Self {
        let order = order.clamp(1, MAX_ORDER);
        Self {
            base: base.into(),
            order,
            entries_per_level: 10u64.pow(order),
            order_name: order.to_string(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    /// Where the entry for position `i` is stored.
    pub fn path(&self, i: u64) -> PathBuf {
        self.dir(i).join(i.to_string())
    }

    /// The directory holding position `i`.
    pub fn dir(&self, i: u64) -> PathBuf {
        let levels = self.levels(i);
        let mut dir = self.base.join(self.subtree_name(levels));
        let mut rest = i;
        for level in (1..levels).rev() {
            let size = self.size_of_level(level);
            dir.push(self.pad(rest / size));
            rest %= size;
        }
        dir
    }

    /// Whether `i` is the last position stored in its directory.
    pub fn is_last_dir_entry(&self, i: u64) -> bool {
        match i.checked_add(1) {
            Some(next) => self.dir(i) != self.dir(next),
            None => true,
        }
    }

    fn subtree_name(&self, levels: u32) -> String {
        vec![self.order_name.as_str(); levels as usize].join(".")
    }

    fn levels(&self, i: u64) -> u32 {
        if i == 0 {
            return 1;
        }
        let mut levels = 0;
        let mut rest = i;
        while rest > 0 {
            rest /= self.entries_per_level;
            levels += 1;
        }
        levels
    }

    fn size_of_level(&self, level: u32) -> u64 {
        self.entries_per_level.saturating_pow(level)
    }

    fn pad(&self, i: u64) -> String {
        format!("{:0width$}", i, width = self.order as usize)
    }
}
