//! Replaying the log to a reader, resumable by event id.
//!
//! An event id is `<store identity>:<position>`. Ids from a different store
//! identity mean the store was recreated since the reader last saw it, so the
//! reader gets everything still retained.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::store::{EventStore, Result, StoreError};

pub const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventId {
    pub identity: Uuid,
    pub position: u64,
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identity, self.position)
    }
}

impl FromStr for EventId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || StoreError::InvalidResumeId(s.to_string());
        let (identity, position) = s.split_once(':').ok_or_else(invalid)?;
        Ok(EventId {
            identity: Uuid::parse_str(identity).map_err(|_| invalid())?,
            position: position.parse().map_err(|_| invalid())?,
        })
    }
}

/// Position after which to resume for a `--resume-after` argument.
pub fn parse_resume(arg: &str, identity: Uuid) -> Result<u64> {
    if arg == "0" {
        return Ok(0);
    }
    let invalid = || StoreError::InvalidResumeId(arg.to_string());
    let (id, position) = arg.split_once(':').ok_or_else(invalid)?;
    if position.is_empty() || position.contains(':') {
        return Err(invalid());
    }
    if Uuid::parse_str(id).ok() != Some(identity) {
        debug!(resume = arg, "Resume id from another store, replaying everything");
        return Ok(0);
    }
    position.parse().map_err(|_| invalid())
}

pub struct EventStream {
    store: Arc<dyn EventStore>,
    identity: Uuid,
    sent: u64,
    include_ids: bool,
}

impl EventStream {
    /// Start after `resume`, or after the current head when not resuming.
    pub fn new(store: Arc<dyn EventStore>, resume: Option<u64>, include_ids: bool) -> Result<Self> {
        let head = store.head()?;
        let tail = store.tail()?;
        let mut sent = match resume {
            Some(resume) if resume <= head => resume,
            _ => head,
        };
        if sent < tail {
            sent = tail - 1;
        }
        Ok(Self {
            identity: store.identity(),
            store,
            sent,
            include_ids,
        })
    }

    /// Last position handed out.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn is_up_to_date(&self) -> Result<bool> {
        Ok(self.store.head()? <= self.sent)
    }

    /// Render up to `max` positions following the last one sent.
    ///
    /// Positions trimmed in the meantime are skipped but still count.
    pub fn next_batch(&mut self, max: usize) -> Result<Vec<String>> {
        let head = self.store.head()?;
        let mut lines = Vec::new();
        let mut processed = 0;
        while self.sent < head && processed < max {
            let position = self.sent + 1;
            if let Some(payload) = self.store.get(position)? {
                lines.push(self.render(position, payload));
            }
            self.sent = position;
            processed += 1;
        }
        Ok(lines)
    }

    fn render(&self, position: u64, payload: String) -> String {
        if !self.include_ids {
            return payload;
        }
        match serde_json::from_str::<Value>(&payload) {
            Ok(Value::Object(mut event)) => {
                let id = EventId {
                    identity: self.identity,
                    position,
                };
                event.insert("id".to_string(), Value::String(id.to_string()));
                Value::Object(event).to_string()
            }
            _ => payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn create_test_store(count: u64) -> Arc<dyn EventStore> {
        let store = MemStore::new();
        for i in 1..=count {
            store.append(&format!("{{\"n\":{i}}}")).unwrap();
        }
        Arc::new(store)
    }

    #[test]
    fn test_event_id_round_trip() {
        let id = EventId {
            identity: Uuid::new_v4(),
            position: 42,
        };
        assert_eq!(id.to_string().parse::<EventId>().unwrap(), id);
        assert!("nonsense".parse::<EventId>().is_err());
    }

    #[test]
    fn test_parse_resume() {
        let identity = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(parse_resume("0", identity).unwrap(), 0);
        assert_eq!(parse_resume(&format!("{identity}:17"), identity).unwrap(), 17);
        assert_eq!(parse_resume(&format!("{other}:17"), identity).unwrap(), 0);
        assert!(matches!(
            parse_resume("17", identity),
            Err(StoreError::InvalidResumeId(_))
        ));
        assert!(parse_resume(&format!("{identity}:x"), identity).is_err());
        assert!(parse_resume(&format!("{identity}:1:2"), identity).is_err());
        assert!(parse_resume(&format!("{identity}:"), identity).is_err());
        assert!(matches!(
            parse_resume(&format!("{other}:"), identity),
            Err(StoreError::InvalidResumeId(_))
        ));
    }

    #[test]
    fn test_starts_at_head_without_resume() {
        let store = create_test_store(5);
        let mut stream = EventStream::new(store.clone(), None, false).unwrap();
        assert_eq!(stream.sent(), 5);
        assert!(stream.is_up_to_date().unwrap());

        store.append("{\"n\":6}").unwrap();
        assert_eq!(stream.next_batch(32).unwrap(), vec!["{\"n\":6}"]);
    }

    #[test]
    fn test_resume_beyond_head_starts_at_head() {
        let store = create_test_store(3);
        let stream = EventStream::new(store, Some(99), false).unwrap();
        assert_eq!(stream.sent(), 3);
    }

    #[test]
    fn test_resume_before_tail_skips_trimmed() {
        let store = create_test_store(5);
        store.trim(2).unwrap();

        let mut stream = EventStream::new(store, Some(0), false).unwrap();
        assert_eq!(stream.sent(), 2);
        assert_eq!(
            stream.next_batch(32).unwrap(),
            vec!["{\"n\":3}", "{\"n\":4}", "{\"n\":5}"]
        );
    }

    #[test]
    fn test_batches() {
        let store = create_test_store(5);
        let mut stream = EventStream::new(store, Some(0), false).unwrap();

        assert_eq!(stream.next_batch(2).unwrap().len(), 2);
        assert_eq!(stream.next_batch(2).unwrap().len(), 2);
        assert_eq!(stream.next_batch(2).unwrap().len(), 1);
        assert!(stream.next_batch(2).unwrap().is_empty());
        assert!(stream.is_up_to_date().unwrap());
    }

    #[test]
    fn test_ids_added_to_json_objects() {
        let store = create_test_store(1);
        store.append("plain text").unwrap();
        let identity = store.identity();

        let mut stream = EventStream::new(store, Some(0), true).unwrap();
        let lines = stream.next_batch(32).unwrap();

        let first: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["n"], 1);
        assert_eq!(first["id"], format!("{identity}:1"));
        assert_eq!(lines[1], "plain text");
    }
}
