use crate::error::Result;
use crate::git::{CommitMeta, Mirror};
use crate::language::Language;
use crate::model::Snapshot;

/// Counts from the diff of `commit` against the empty tree. Every line is an
/// added line, so there is no blank/comment split.
pub fn snapshot<M: Mirror + ?Sized>(mirror: &M, commit: &CommitMeta) -> Result<Snapshot> {
    let changes = mirror.diff_tree(None, &commit.id)?;

    let mut snapshot = Snapshot {
        commit_id: Some(commit.id.clone()),
        timestamp: Some(commit.timestamp),
        ..Snapshot::default()
    };
    for change in &changes {
        let lines = change.additions();
        let stats = snapshot
            .languages
            .entry(Language::classify(&change.path))
            .or_default();
        stats.files += 1;
        stats.code += lines;
        snapshot.file_count += 1;
        snapshot.line_count += lines;
    }
    Ok(snapshot)
}
