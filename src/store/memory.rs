//! In-process event store for single node setups and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

use super::retention::TrimStats;
use super::{EventStore, Result};

#[derive(Debug, Default)]
struct Log {
    events: BTreeMap<u64, String>,
    head: u64,
    tail: u64,
}

/// An [`EventStore`] kept in memory, lost on restart.
#[derive(Debug)]
pub struct MemStore {
    identity: Uuid,
    log: Mutex<Log>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            identity: Uuid::new_v4(),
            log: Mutex::new(Log {
                tail: 1,
                ..Log::default()
            }),
        }
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventStore for MemStore {
    fn identity(&self) -> Uuid {
        self.identity
    }

    fn head(&self) -> Result<u64> {
        Ok(self.log().head)
    }

    fn tail(&self) -> Result<u64> {
        let log = self.log();
        Ok(if log.head == 0 { 0 } else { log.tail })
    }

    fn append(&self, payload: &str) -> Result<u64> {
        let mut log = self.log();
        log.head += 1;
        let position = log.head;
        log.events.insert(position, payload.to_string());
        debug!(position, "Appended event in memory");
        Ok(position)
    }

    fn get(&self, position: u64) -> Result<Option<String>> {
        Ok(self.log().events.get(&position).cloned())
    }

    fn trim(&self, upto: u64) -> Result<TrimStats> {
        let mut log = self.log();
        let upto = upto.min(log.head.saturating_sub(1));
        let mut removed = 0;
        while log.tail <= upto {
            let position = log.tail;
            if log.events.remove(&position).is_some() {
                removed += 1;
            }
            log.tail += 1;
        }
        Ok(TrimStats {
            removed,
            tail: if log.head == 0 { 0 } else { log.tail },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_get_trim() {
        let store = MemStore::new();
        assert_eq!(store.head().unwrap(), 0);
        assert_eq!(store.tail().unwrap(), 0);

        assert_eq!(store.append("a").unwrap(), 1);
        assert_eq!(store.append("b").unwrap(), 2);
        assert_eq!(store.append("c").unwrap(), 3);
        assert_eq!(store.tail().unwrap(), 1);
        assert_eq!(store.get(2).unwrap().as_deref(), Some("b"));

        assert_eq!(store.trim(1).unwrap(), TrimStats { removed: 1, tail: 2 });
        assert_eq!(store.get(1).unwrap(), None);

        assert_eq!(store.trim(10).unwrap(), TrimStats { removed: 1, tail: 3 });
        assert_eq!(store.get(3).unwrap().as_deref(), Some("c"));
        assert_eq!(store.trim(10).unwrap().removed, 0);
    }

    #[test]
    fn test_empty_trim() {
        let store = MemStore::new();
        assert_eq!(store.trim(5).unwrap(), TrimStats::default());
        assert_eq!(store.get(0).unwrap(), None);
    }
}
