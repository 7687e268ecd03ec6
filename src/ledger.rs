use crate::error::{RepoStatError, Result};
use crate::model::{CommitRecord, DateInterval, Identity, SortBy};
use crate::window::{InRange, Nestable, Window};
use serde::Serialize;
use std::collections::BTreeSet;

/// One identity's commit history with running totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ledger {
    identity: Identity,
    commits: Window<CommitRecord>,
    additions: u64,
    deletions: u64,
    #[serde(skip)]
    timestamps: BTreeSet<i64>,
}

impl Ledger {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            commits: Window::new(),
            additions: 0,
            deletions: 0,
            timestamps: BTreeSet::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns false and leaves the ledger untouched when a record with the
    /// same timestamp is already present.
    pub fn add(&mut self, record: CommitRecord) -> bool {
        if !self.timestamps.insert(record.timestamp.timestamp()) {
            return false;
        }
        self.additions += record.additions;
        self.deletions += record.deletions;
        self.commits.add(record);
        true
    }

    /// Visible commits, newest first.
    pub fn commits(&self) -> Vec<&CommitRecord> {
        let mut commits = self.commits.data();
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        commits
    }

    pub fn additions(&self) -> u64 {
        if self.commits.is_limited() {
            self.commits.iter().map(|c| c.additions).sum()
        } else {
            self.additions
        }
    }

    pub fn deletions(&self) -> u64 {
        if self.commits.is_limited() {
            self.commits.iter().map(|c| c.deletions).sum()
        } else {
            self.deletions
        }
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub fn get_by_id(&self, id: &str) -> Result<&CommitRecord> {
        self.commits
            .full()
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| RepoStatError::CommitNotFound(id.to_string()))
    }

    pub fn is_limited(&self) -> bool {
        self.commits.is_limited()
    }
}

impl InRange for Ledger {
    fn in_range(&self, interval: &DateInterval) -> bool {
        self.commits.in_range(interval)
    }
}

impl Nestable for Ledger {
    fn limit_to_range(&mut self, interval: &DateInterval) {
        self.commits.limit_to_range(interval);
    }

    fn include_all(&mut self) {
        self.commits.include_all();
    }
}

/// Ledgers for every identity seen in one role (author or committer).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LedgerBook {
    ledgers: Window<Ledger>,
}

impl LedgerBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, identity: &Identity, record: CommitRecord) -> bool {
        match self.ledgers.position(|l| l.identity() == identity) {
            Some(idx) => self.ledgers.modify(idx, |l| l.add(record)).unwrap_or(false),
            None => {
                let mut ledger = Ledger::new(identity.clone());
                let added = ledger.add(record);
                self.ledgers.add(ledger);
                added
            }
        }
    }

    /// Looks an identity up by name or e-mail among all ledgers, including
    /// those with nothing inside the active window.
    pub fn get(&self, needle: &str) -> Result<&Ledger> {
        self.ledgers
            .full()
            .iter()
            .find(|l| l.identity().matches(needle))
            .ok_or_else(|| RepoStatError::IdentityNotFound(needle.to_string()))
    }

    pub fn sorted(&self, sort: SortBy) -> Vec<&Ledger> {
        let mut ledgers = self.ledgers.data();
        match sort {
            SortBy::Commits => ledgers.sort_by(|a, b| b.commit_count().cmp(&a.commit_count())),
            SortBy::Additions => ledgers.sort_by(|a, b| b.additions().cmp(&a.additions())),
            SortBy::Deletions => ledgers.sort_by(|a, b| b.deletions().cmp(&a.deletions())),
            SortBy::Name => ledgers.sort_by(|a, b| a.identity().name.cmp(&b.identity().name)),
        }
        ledgers
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }
}

impl InRange for LedgerBook {
    fn in_range(&self, interval: &DateInterval) -> bool {
        self.ledgers.in_range(interval)
    }
}

impl Nestable for LedgerBook {
    fn limit_to_range(&mut self, interval: &DateInterval) {
        self.ledgers.limit_to_range(interval);
    }

    fn include_all(&mut self) {
        self.ledgers.include_all();
    }
}
