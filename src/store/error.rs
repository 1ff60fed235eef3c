use std::path::PathBuf;

use thiserror::Error;

use crate::fs::nfs;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt value in {}: {value:?}", path.display())]
    Corrupt { path: PathBuf, value: String },

    #[error("Cannot advance {} after {tries} tries", path.display())]
    CannotAdvance { path: PathBuf, tries: u64 },

    #[error("Cannot submit event to {} after {tries} tries", path.display())]
    CannotSubmit { path: PathBuf, tries: u64 },

    #[error("Cannot read {} after {tries} tries", path.display())]
    CannotRead { path: PathBuf, tries: u64 },

    #[error("Transaction {uuid} committed but its outcome is no longer recorded")]
    Outcome { uuid: String },

    #[error("Invalid store identity: {0}")]
    InvalidIdentity(#[from] uuid::Error),

    #[error("Invalid event id: {0}")]
    InvalidResumeId(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying the failed read may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(e) if nfs::is_transient_read(e))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
