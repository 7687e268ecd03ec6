use crate::error::Result;
use crate::ledger::{Ledger, LedgerBook};
use crate::model::{CommitRecord, DateInterval, Role, Snapshot};
use crate::window::{InRange, Nestable, Window};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Per-branch aggregate: tip counts plus the history-to-date ledgers.
///
/// The file/line figures always describe the tip tree and are independent of
/// the ledger totals, which describe the change history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchSnapshot {
    name: String,
    snapshot: Snapshot,
    commits: Window<CommitRecord>,
    authors: LedgerBook,
    committers: LedgerBook,
    last_processed: Option<String>,
    synced_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl BranchSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snapshot: Snapshot::default(),
            commits: Window::new(),
            authors: LedgerBook::new(),
            committers: LedgerBook::new(),
            last_processed: None,
            synced_at: None,
            seen: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn file_count(&self) -> u64 {
        self.snapshot.file_count
    }

    pub fn line_count(&self) -> u64 {
        self.snapshot.line_count
    }

    pub fn uses_external_counter(&self) -> bool {
        self.snapshot.uses_external_counter
    }

    pub fn last_processed(&self) -> Option<&str> {
        self.last_processed.as_deref()
    }

    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    /// Visible commits on the branch, newest first.
    pub fn commits(&self) -> Vec<&CommitRecord> {
        let mut commits = self.commits.data();
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        commits
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub fn ledgers(&self, role: Role) -> &LedgerBook {
        match role {
            Role::Author => &self.authors,
            Role::Committer => &self.committers,
        }
    }

    pub fn ledger(&self, identity: &str, role: Role) -> Result<&Ledger> {
        self.ledgers(role).get(identity)
    }

    /// Files `record` under the branch and under both its author's and its
    /// committer's ledgers. Returns false if the branch already holds it.
    pub fn add_commit(&mut self, record: CommitRecord) -> bool {
        if !self.seen.insert(record.id.clone()) {
            return false;
        }
        self.authors.record(&record.author, record.clone());
        self.committers.record(&record.committer, record.clone());
        self.commits.add(record);
        true
    }

    pub fn set_tip(&mut self, snapshot: Snapshot, marker: String, at: DateTime<Utc>) {
        self.snapshot = snapshot;
        self.last_processed = Some(marker);
        self.synced_at = Some(at);
    }
}

impl InRange for BranchSnapshot {
    fn in_range(&self, interval: &DateInterval) -> bool {
        self.commits.in_range(interval)
    }
}

impl Nestable for BranchSnapshot {
    fn limit_to_range(&mut self, interval: &DateInterval) {
        self.commits.limit_to_range(interval);
        self.authors.limit_to_range(interval);
        self.committers.limit_to_range(interval);
    }

    fn include_all(&mut self) {
        self.commits.include_all();
        self.authors.include_all();
        self.committers.include_all();
    }
}
