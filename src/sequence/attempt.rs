//! One actor's pass through the phases of an open transaction.
//!
//! ```text
//! update/<uuid>/
//!   next/                 empty while the transaction is open
//!   next/closed/value     the proposal, present once closed
//!   event | ceiling       inputs staged by the initiator
//! ```
//!
//! Any actor may run the remaining phases of any open transaction. Each step
//! is a single rename that succeeds for exactly one actor, and every actor
//! re-inspects the directory afterwards, so it does not matter who wins.
//!
//! A helper about to commit someone else's transaction first links the
//! proposal under `outcome/<uuid>`. The initiator claims that record once it
//! gets to run again, however late that is.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::advance::Advance;
use super::value::{CLOSED, NEXT, UpdatableValue, VALUE, encode};
use crate::fs::{self, Scratch, area::rename_and_delete_unique};
use crate::store::Result;

/// What this actor decided the transaction should commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Proposal {
    Advance(u64),
    /// The advance strategy refuses; the transaction gets abandoned.
    Refused,
    /// The read may already include this transaction's outcome.
    Unknown,
}

pub(crate) struct Attempt<'a, A> {
    value: &'a UpdatableValue<A>,
    uuid: String,
    udir: PathBuf,
    next_dir: PathBuf,
    closed_dir: PathBuf,
    proposal_path: PathBuf,
    max_tries: u64,
    helping: bool,
    pub(crate) tries: u64,
    proposal: Proposal,
    closed: bool,
    preserved: bool,
    recorded: bool,
    claimed: Option<u64>,
    pub(crate) committed: bool,
    pub(crate) my_commit: bool,
    pub(crate) abandoned: bool,
    pub(crate) finished: bool,
}

impl<'a, A: Advance> Attempt<'a, A> {
    /// Drive our own transaction `uuid` to completion within `max_tries`.
    pub(crate) fn run(value: &'a UpdatableValue<A>, uuid: String, max_tries: u64) -> Result<Self> {
        let mut attempt = Self::drive(value, uuid, max_tries, false)?;
        if attempt.finished {
            attempt.claimed = value.take_outcome(&attempt.uuid);
        }
        Ok(attempt)
    }

    /// Drive somebody else's transaction `uuid` to completion.
    pub(crate) fn help(value: &'a UpdatableValue<A>, uuid: String, max_tries: u64) -> Result<Self> {
        Self::drive(value, uuid, max_tries, true)
    }

    fn drive(
        value: &'a UpdatableValue<A>,
        uuid: String,
        max_tries: u64,
        helping: bool,
    ) -> Result<Self> {
        let udir = value.area().update.join(&uuid);
        let next_dir = udir.join(NEXT);
        let closed_dir = next_dir.join(CLOSED);
        let proposal_path = closed_dir.join(VALUE);
        let mut attempt = Self {
            value,
            uuid,
            udir,
            next_dir,
            closed_dir,
            proposal_path,
            max_tries,
            helping,
            tries: 0,
            proposal: Proposal::Unknown,
            closed: false,
            preserved: false,
            recorded: false,
            claimed: None,
            committed: false,
            my_commit: false,
            abandoned: false,
            finished: false,
        };
        attempt.read()?;
        attempt.spin_finish()?;
        Ok(attempt)
    }

    pub(crate) fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The value this transaction committed, when it can still be told.
    pub(crate) fn outcome(&self) -> Option<u64> {
        match self.proposal {
            Proposal::Advance(next) => Some(next),
            Proposal::Refused => None,
            Proposal::Unknown => self
                .claimed
                .or_else(|| self.value.preserved_value(&self.uuid)),
        }
    }

    /// Phase 2: read the current value and decide the proposal.
    fn read(&mut self) -> Result<()> {
        while self.tries < self.max_tries {
            match self.value.get() {
                Ok(current) => {
                    if !self.is_uncommitted() {
                        self.proposal = Proposal::Unknown;
                        return Ok(());
                    }
                    match self.value.advance().next(&self.udir, current) {
                        Ok(Some(next)) => {
                            self.proposal = Proposal::Advance(next);
                            return Ok(());
                        }
                        Ok(None) => {
                            self.proposal = Proposal::Refused;
                            return Ok(());
                        }
                        Err(e) if e.is_transient() => {}
                        Err(e) => return Err(e),
                    }
                }
                Err(e) if e.is_transient() => {
                    self.value.stats().stale_read();
                    if !fs::exists(&self.udir) {
                        self.finished = true;
                        return Ok(());
                    }
                }
                Err(e) => return Err(e),
            }
            self.tries += 1;
            self.value.pause(self.tries);
        }
        Ok(())
    }

    /// Whether a read taken just before this check predates the commit.
    fn is_uncommitted(&self) -> bool {
        fs::exists(&self.proposal_path)
            || (!fs::exists(&self.closed_dir) && fs::exists(&self.udir))
    }

    fn spin_finish(&mut self) -> Result<()> {
        while !self.finished && self.tries < self.max_tries {
            self.finish()?;
            self.tries += 1;
            if !self.finished {
                self.value.pause(self.tries);
            }
        }
        Ok(())
    }

    /// Phases 3 to 6.
    fn finish(&mut self) -> Result<()> {
        match self.proposal {
            Proposal::Refused => {
                self.abandon();
                return Ok(());
            }
            Proposal::Advance(next) => {
                if !self.value.advance().publish(&self.udir, next) {
                    self.finished = !fs::exists(&self.udir);
                    return Ok(());
                }
                self.propose(next)?;
            }
            Proposal::Unknown => {
                self.closed = self.closed || fs::exists(&self.closed_dir);
            }
        }
        self.commit();
        self.clean();
        Ok(())
    }

    /// Phases 3 and 4: close the transaction on `next`.
    fn propose(&mut self, next: u64) -> Result<()> {
        if !self.closed {
            self.closed = fs::exists(&self.closed_dir);
        }
        if !self.closed {
            {
                let scratch = Scratch::new(self.value.area())?;
                std::fs::create_dir(scratch.dir().join(CLOSED))?;
                scratch.write(Path::new(CLOSED).join(VALUE), &encode(next))?;
                fs::try_rename(scratch.dir(), &self.next_dir);
            }
            self.closed = fs::exists(&self.closed_dir);
        }
        Ok(())
    }

    /// Phase 5.
    fn commit(&mut self) {
        if self.committed || !self.closed {
            return;
        }
        if !self.preserved {
            self.preserved = self.value.preserve(&self.uuid, &self.proposal_path);
        }
        if self.helping && !self.recorded {
            self.recorded = self.value.record_outcome(&self.uuid, &self.proposal_path);
        }
        if self.value.replace(&self.proposal_path) {
            self.my_commit = true;
            self.committed = true;
        } else {
            self.committed = !fs::exists(&self.proposal_path);
        }
    }

    /// Phase 6.
    fn clean(&mut self) {
        if self.committed {
            rename_and_delete_unique(&self.udir, &self.value.area().delete);
            self.value.area().clean_preserved();
        }
        self.finished = !fs::exists(&self.udir);
    }

    fn abandon(&mut self) {
        debug!(uuid = %self.uuid, "Abandoning transaction that cannot advance");
        rename_and_delete_unique(&self.udir, &self.value.area().delete);
        self.abandoned = true;
        self.finished = !fs::exists(&self.udir);
    }
}
