use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::id::FsId;
use super::options::StoreOptions;
use super::retention::{self, TrimStats};
use super::{EventStore, Result, StoreError};
use crate::fs::{self, nfs};
use crate::observability::{Metrics, MetricsSnapshot};
use crate::sequence::{EventSequence, Sequence, SequenceCache};
use crate::sharder::Sharder;

const UUID: &str = "uuid";
const HEAD: &str = "head";
const TAIL: &str = "tail";
const EVENTS: &str = "events";

/// Filesystem backed event store shared by any number of processes
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    id: FsId,
    identity: Uuid,
    head: SequenceCache<EventSequence>,
    tail: SequenceCache<Sequence>,
    sharder: Sharder,
    options: StoreOptions,
    metrics: Metrics,
}

impl FsStore {
    /// Open or create a store at the given root with default options
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::open_with(root, StoreOptions::default())
    }

    /// Open or create a store at the given root
    pub fn open_with<P: AsRef<Path>>(root: P, options: StoreOptions) -> Result<Self> {
        let root = root.as_ref();
        info!("Opening event store at: {}", root.display());
        std::fs::create_dir_all(root)?;

        let sharder = Sharder::new(root.join(EVENTS), options.sharder_order);
        let id = FsId::new(root.join(UUID), options.txn.clone());
        let head = EventSequence::new(root.join(HEAD), sharder.clone(), options.txn.clone());
        let tail = Sequence::new(root.join(TAIL), options.txn.clone());

        let identity = id.init(options.init_tries)?;
        head.init(0, options.init_tries)?;
        tail.init(1, options.init_tries)?;

        info!(%identity, "Event store opened");
        Ok(Self {
            root: root.to_path_buf(),
            id,
            identity,
            head: SequenceCache::new(head, options.read_tries),
            tail: SequenceCache::new(tail, options.read_tries),
            sharder,
            options,
            metrics: Metrics::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sharder(&self) -> &Sharder {
        &self.sharder
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(
            self.head.sequence().stats(),
            self.tail.sequence().stats(),
        )
    }

    /// Sweep abandoned staging and delete entries of the identity, head and
    /// tail areas now, whatever the interval.
    ///
    /// Returns whether everything old enough was reclaimed.
    pub fn scavenge(&self) -> bool {
        let txn = &self.options.txn;
        let areas = [
            self.id.area(),
            self.head.sequence().area(),
            self.tail.sequence().area(),
        ];
        let mut done = true;
        for area in areas {
            done &= area.scavenge(txn.scavenge_age, txn.scavenge_batch);
        }
        info!(done, "Scavenged event store");
        done
    }

    fn read_entry(&self, position: u64) -> Result<Option<String>> {
        let path = self.sharder.path(position);
        for attempt in 1..=self.options.read_tries {
            match fs::read_utf8(&path) {
                Ok(payload) => return Ok(Some(payload)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) if nfs::is_stale_handle(&e) => {
                    debug!(position, "Stale handle reading entry, retrying");
                    self.options.txn.backoff.pause(attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::CannotRead {
            path,
            tries: self.options.read_tries,
        })
    }
}

impl EventStore for FsStore {
    fn identity(&self) -> Uuid {
        self.identity
    }

    fn head(&self) -> Result<u64> {
        self.head.get()
    }

    fn tail(&self) -> Result<u64> {
        if self.head()? == 0 {
            return Ok(0);
        }
        Ok(self.tail.get()?.max(1))
    }

    fn append(&self, payload: &str) -> Result<u64> {
        match self
            .head
            .sequence()
            .submit(payload, self.options.append_tries)
        {
            Ok(position) => {
                self.head.observe(position);
                self.metrics.appended();
                debug!(position, "Appended event");
                Ok(position)
            }
            Err(e) => {
                self.metrics.append_failed();
                warn!(error = %e, "Append failed");
                Err(e)
            }
        }
    }

    fn get(&self, position: u64) -> Result<Option<String>> {
        if position == 0
            || !self.head.is_greater_than_or_equal(position)?
            || !self.tail.is_less_than_or_equal(position)?
        {
            self.metrics.missed();
            return Ok(None);
        }
        let payload = self.read_entry(position)?;
        if payload.is_none() {
            self.metrics.missed();
        }
        Ok(payload)
    }

    fn trim(&self, upto: u64) -> Result<TrimStats> {
        let head = self.head()?;
        let upto = upto.min(head.saturating_sub(1));
        if upto == 0 {
            return Ok(TrimStats {
                removed: 0,
                tail: self.tail()?,
            });
        }

        let stats = retention::advance_tail(
            &self.tail,
            &self.sharder,
            upto + 1,
            self.options.trim_tries,
        )?;
        self.metrics.trimmed(stats.removed);
        info!(upto, removed = stats.removed, tail = stats.tail, "Trimmed events");
        Ok(stats)
    }
}
