//! Turns one commit into a [`CommitRecord`] by diffing it against its parents.
//!
//! A root commit is diffed against the empty tree. A merge is diffed against
//! every parent and the per-parent results are summed, so a merge's weight
//! grows with its parent count.

use crate::error::Result;
use crate::git::{CommitMeta, FileChange, Mirror};
use crate::model::CommitRecord;

pub fn commit_record<M: Mirror + ?Sized>(mirror: &M, meta: &CommitMeta) -> Result<CommitRecord> {
    let per_parent = if meta.parents.is_empty() {
        vec![mirror.diff_tree(None, &meta.id)?]
    } else {
        meta.parents
            .iter()
            .map(|parent| mirror.diff_tree(Some(parent), &meta.id))
            .collect::<Result<Vec<_>>>()?
    };
    Ok(build_record(meta, &per_parent))
}

/// `per_parent` holds one diff per parent comparison (a single empty-tree
/// diff for a root commit).
pub fn build_record(meta: &CommitMeta, per_parent: &[Vec<FileChange>]) -> CommitRecord {
    let mut additions = 0;
    let mut deletions = 0;
    let mut changed_files = 0;
    for changes in per_parent {
        for change in changes {
            additions += change.additions();
            deletions += change.deletions();
        }
        changed_files += changes.len() as u64;
    }

    CommitRecord {
        id: meta.id.clone(),
        timestamp: meta.timestamp,
        additions,
        deletions,
        changed_files,
        is_merge: meta.parents.len() > 1,
        message: meta.message.clone(),
        author: meta.author.clone(),
        committer: meta.committer.clone(),
    }
}
