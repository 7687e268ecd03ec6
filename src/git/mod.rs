//! Plumbing contract the session drives, plus the gix/git-backed provider.

pub mod branch;
pub mod repo;

use crate::cancel::Cancellation;
use crate::config::Credentials;
use crate::error::Result;
use crate::model::Identity;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

pub use repo::{GitMirror, GitProvider};

#[derive(Debug, Clone, PartialEq)]
pub struct CommitMeta {
    pub id: String,
    pub parents: Vec<String>,
    pub author: Identity,
    pub committer: Identity,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// One edit region: lines `old` in the parent were replaced by lines `new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old: Range<u32>,
    pub new: Range<u32>,
}

impl Hunk {
    pub fn new(old: Range<u32>, new: Range<u32>) -> Self {
        Self { old, new }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub hunks: Vec<Hunk>,
    pub is_binary: bool,
}

impl FileChange {
    pub fn additions(&self) -> u64 {
        self.hunks.iter().map(|h| (h.new.end - h.new.start) as u64).sum()
    }

    pub fn deletions(&self) -> u64 {
        self.hunks.iter().map(|h| (h.old.end - h.old.start) as u64).sum()
    }
}

/// An opened local mirror of one remote.
pub trait Mirror {
    fn path(&self) -> &Path;

    /// Updates local branches from `url`, dropping ones that vanished upstream.
    fn fetch(&self, url: &str, credentials: &Credentials, cancel: &Cancellation) -> Result<()>;

    /// Short branch name to tip commit id.
    fn branch_tips(&self) -> Result<BTreeMap<String, String>>;

    fn resolve(&self, reference: &str) -> Result<String>;

    fn commit(&self, id: &str) -> Result<CommitMeta>;

    /// Commits reachable from `tip` but not from `hidden`, oldest first.
    fn rev_walk(&self, tip: &str, hidden: Option<&str>) -> Result<Vec<CommitMeta>>;

    /// Newest commit reachable from `tip` made at or before `date`.
    fn latest_at(&self, tip: &str, date: DateTime<Utc>) -> Result<Option<CommitMeta>> {
        let history = self.rev_walk(tip, None)?;
        Ok(history.into_iter().rev().find(|c| c.timestamp <= date))
    }

    /// Per-file edits from `old` to `new`; `None` stands for the empty tree.
    fn diff_tree(&self, old: Option<&str>, new: &str) -> Result<Vec<FileChange>>;

    /// Writes the tree of `commit` into `dest`.
    fn checkout(&self, commit: &str, dest: &Path) -> Result<()>;
}

pub trait VcsProvider {
    type Mirror: Mirror;

    fn kind(&self) -> &'static str;

    fn open(&self, path: &Path) -> Result<Self::Mirror>;

    fn clone_mirror(
        &self,
        url: &str,
        dest: &Path,
        credentials: &Credentials,
        cancel: &Cancellation,
    ) -> Result<Self::Mirror>;

    fn list_remote_branches(
        &self,
        url: &str,
        credentials: &Credentials,
        cancel: &Cancellation,
    ) -> Result<Vec<String>>;
}
