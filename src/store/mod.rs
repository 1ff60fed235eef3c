/// Event stores: an append-only log with retention
///
/// The filesystem store keeps a totally ordered log of opaque payloads in a
/// directory that any number of processes, on any number of hosts sharing the
/// same filesystem, may append to and trim concurrently. It needs nothing but
/// atomic rename and hard links from the filesystem.
///
/// ## Layout
///
/// ```text
/// <root>/
///   uuid/value/value   identity of this store
///   head/value         highest committed position
///   tail/value         lowest retained position
///   events/...         one file per position, see `Sharder`
/// ```
///
/// ## Retention
///
/// Trimming advances the tail one position at a time and deletes the entries
/// it leaves behind. The newest entry is never trimmed.
///
/// ## Usage
///
/// ```rust,ignore
/// use fsstore::store::{EventStore, FsStore};
///
/// let store = FsStore::open("data/events")?;
/// let position = store.append(r#"{"type":"ref-updated"}"#)?;
/// let payload = store.get(position)?;
/// ```

pub mod error;
pub mod fs;
pub mod id;
pub mod memory;
pub mod options;
pub mod retention;

use uuid::Uuid;

pub use error::{Result, StoreError};
pub use fs::FsStore;
pub use memory::MemStore;
pub use options::StoreOptions;
pub use retention::TrimStats;

/// An append-only log of opaque payloads.
///
/// Positions start at 1 and have no gaps. `tail()` is 0 while the log is
/// empty; otherwise every position in `tail()..=head()` is retained, give or
/// take a concurrent trim.
pub trait EventStore: Send + Sync {
    /// Stable identity, changes only when the store is recreated.
    fn identity(&self) -> Uuid;

    /// Highest committed position, 0 when nothing was ever appended.
    fn head(&self) -> Result<u64>;

    /// Lowest retained position, 0 while the log is empty.
    fn tail(&self) -> Result<u64>;

    /// Append a payload and return its position.
    fn append(&self, payload: &str) -> Result<u64>;

    /// The payload at `position`, if it is still retained.
    fn get(&self, position: u64) -> Result<Option<String>>;

    /// Drop every entry up to and including `upto`, keeping at least the
    /// newest one.
    fn trim(&self, upto: u64) -> Result<TrimStats>;
}
