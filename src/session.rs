use crate::aggregate;
use crate::branch::BranchSnapshot;
use crate::cancel::Cancellation;
use crate::config::{Credentials, SessionConfig};
use crate::error::{RepoStatError, Result};
use crate::git::{CommitMeta, GitProvider, Mirror, VcsProvider};
use crate::ledger::Ledger;
use crate::model::{DateInterval, Role, Snapshot, SortBy};
use crate::oracle::LineCountOracle;
use crate::window::{Nestable, Window};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub branch: Option<String>,
    /// When false only refs are refreshed; no ledgers or counts are touched.
    pub compute_stats: bool,
    pub force: bool,
    pub use_external_counter: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            branch: None,
            compute_stats: true,
            force: false,
            use_external_counter: true,
        }
    }
}

impl SyncOptions {
    pub fn branch(name: impl Into<String>) -> Self {
        Self { branch: Some(name.into()), ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub fetch_failed: bool,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub pruned: Vec<String>,
    pub new_commits: usize,
}

/// Owns one remote's local mirror and the per-branch statistics built from it.
pub struct RepositorySession<P: VcsProvider = GitProvider> {
    url: String,
    credentials: Credentials,
    config: SessionConfig,
    provider: P,
    mirror: P::Mirror,
    oracle: LineCountOracle,
    branches: BTreeMap<String, BranchSnapshot>,
}

impl RepositorySession<GitProvider> {
    pub fn open(
        url: &str,
        credentials: Credentials,
        config: SessionConfig,
        cancel: &Cancellation,
    ) -> Result<Self> {
        Self::open_with(GitProvider::new(), url, credentials, config, cancel)
    }
}

impl<P: VcsProvider> RepositorySession<P> {
    pub fn open_with(
        provider: P,
        url: &str,
        credentials: Credentials,
        config: SessionConfig,
        cancel: &Cancellation,
    ) -> Result<Self> {
        let path = config.mirror_path(provider.kind(), url);
        let mirror = open_mirror(&provider, url, &credentials, &path, cancel)?;
        let oracle = LineCountOracle::from_config(&config);
        info!(url, mirror = %path.display(), external_counter = oracle.has_external(), "session opened");

        Ok(Self {
            url: url.to_string(),
            credentials,
            config,
            provider,
            mirror,
            oracle,
            branches: BTreeMap::new(),
        })
    }

    pub fn with_oracle(mut self, oracle: LineCountOracle) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mirror_path(&self) -> &Path {
        self.mirror.path()
    }

    /// Fetches, then brings each selected branch's ledgers and tip counts up
    /// to date. A failed fetch is logged and the local mirror state is used.
    #[instrument(skip_all, fields(url = %self.url))]
    pub fn sync(&mut self, options: &SyncOptions, cancel: &Cancellation) -> Result<SyncReport> {
        cancel.check()?;
        let mut report = SyncReport::default();

        match self.mirror.fetch(&self.url, &self.credentials, cancel) {
            Ok(()) => {}
            Err(RepoStatError::Cancelled) => return Err(RepoStatError::Cancelled),
            Err(e) => {
                warn!(error = %e, "fetch failed, continuing with local mirror state");
                report.fetch_failed = true;
            }
        }

        let tips = self.mirror.branch_tips()?;
        report.pruned = self.resolve_branches(&tips);

        let targets: Vec<(String, String)> = match &options.branch {
            Some(name) => {
                let tip = tips
                    .get(name)
                    .ok_or_else(|| RepoStatError::BranchNotFound(name.clone()))?;
                vec![(name.clone(), tip.clone())]
            }
            None => tips.into_iter().collect(),
        };

        let progress = self.progress_bar();
        for (name, tip) in targets {
            cancel.check()?;
            let current = self.branches.get(&name);
            let moved = current.and_then(|b| b.last_processed()) != Some(tip.as_str());

            if !options.compute_stats {
                self.branches
                    .entry(name.clone())
                    .or_insert_with(|| BranchSnapshot::new(name));
                continue;
            }
            if !moved && !options.force {
                debug!(branch = %name, "tip unchanged");
                report.unchanged.push(name);
                continue;
            }

            progress.set_message(format!("Syncing {name}..."));
            let base = current.cloned().unwrap_or_else(|| BranchSnapshot::new(name.clone()));
            let (updated, added) =
                self.extend_branch(base, &tip, options.use_external_counter, &progress, cancel)?;

            info!(branch = %name, tip = %tip, new_commits = added, "branch synced");
            report.new_commits += added;
            report.updated.push(name.clone());
            self.branches.insert(name, updated);
        }
        progress.finish_and_clear();

        Ok(report)
    }

    fn resolve_branches(&mut self, tips: &BTreeMap<String, String>) -> Vec<String> {
        let gone: Vec<String> = self
            .branches
            .keys()
            .filter(|name| !tips.contains_key(*name))
            .cloned()
            .collect();
        for name in &gone {
            info!(branch = %name, "branch vanished upstream, pruning");
            self.branches.remove(name);
        }
        gone
    }

    /// Works on an owned copy so a failure part-way leaves the stored
    /// snapshot untouched.
    fn extend_branch(
        &self,
        mut branch: BranchSnapshot,
        tip: &str,
        use_external: bool,
        progress: &ProgressBar,
        cancel: &Cancellation,
    ) -> Result<(BranchSnapshot, usize)> {
        let hidden = match branch.last_processed() {
            Some(marker) if self.mirror.commit(marker).is_ok() => Some(marker.to_string()),
            Some(marker) => {
                warn!(branch = %branch.name(), marker, "last processed commit is gone, rewalking history");
                None
            }
            None => None,
        };

        let commits = self.mirror.rev_walk(tip, hidden.as_deref())?;
        let mut added = 0;
        for meta in &commits {
            cancel.check()?;
            let record = aggregate::commit_record(&self.mirror, meta)?;
            if branch.add_commit(record) {
                added += 1;
            }
            progress.inc(1);
        }

        let tip_meta = self.mirror.commit(tip)?;
        let snapshot = self.oracle.snapshot(&self.mirror, &tip_meta, use_external, cancel)?;
        branch.set_tip(snapshot, tip.to_string(), Utc::now());
        Ok((branch, added))
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} {pos} commits")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb
    }

    pub fn branches(&self) -> Vec<&str> {
        self.branches.keys().map(String::as_str).collect()
    }

    pub fn branch_snapshot(&self, name: &str) -> Result<&BranchSnapshot> {
        self.branches
            .get(name)
            .ok_or_else(|| RepoStatError::BranchNotFound(name.to_string()))
    }

    /// Every branch snapshot, restricted to `interval` all the way down to
    /// the individual ledgers. The session's own data is not affected.
    pub fn branch_window(&self, interval: &DateInterval) -> Window<BranchSnapshot> {
        let mut window: Window<BranchSnapshot> = self.branches.values().cloned().collect();
        window.limit_to_range(interval);
        window
    }

    pub fn ledger_for(
        &self,
        branch: &str,
        identity: &str,
        role: Role,
        interval: Option<&DateInterval>,
    ) -> Result<Ledger> {
        let mut ledger = self.branch_snapshot(branch)?.ledger(identity, role)?.clone();
        if let Some(interval) = interval {
            ledger.limit_to_range(interval);
        }
        Ok(ledger)
    }

    pub fn ledgers(
        &self,
        branch: &str,
        role: Role,
        sort: SortBy,
        interval: Option<&DateInterval>,
    ) -> Result<Vec<Ledger>> {
        let mut book = self.branch_snapshot(branch)?.ledgers(role).clone();
        if let Some(interval) = interval {
            book.limit_to_range(interval);
        }
        Ok(book.sorted(sort).into_iter().cloned().collect())
    }

    /// Snapshot of the newest commit, across all branches, made at or before
    /// `date`. Before the first commit this is an all-zero snapshot.
    #[instrument(skip(self, cancel), fields(url = %self.url))]
    pub fn reconstruct_at(
        &mut self,
        date: DateTime<Utc>,
        use_external: bool,
        cancel: &Cancellation,
    ) -> Result<Snapshot> {
        let mut best: Option<CommitMeta> = None;
        for tip in self.mirror.branch_tips()?.values() {
            cancel.check()?;
            if let Some(candidate) = self.mirror.latest_at(tip, date)? {
                if best.as_ref().map_or(true, |b| candidate.timestamp > b.timestamp) {
                    best = Some(candidate);
                }
            }
        }

        match best {
            Some(meta) => {
                debug!(commit = %meta.id, "reconstructing");
                self.oracle.snapshot(&self.mirror, &meta, use_external, cancel)
            }
            None => Ok(Snapshot::default()),
        }
    }

    pub fn history_for_date(
        &mut self,
        date: DateTime<Utc>,
        use_external: bool,
        cancel: &Cancellation,
    ) -> Result<Snapshot> {
        self.reconstruct_at(date, use_external, cancel)
    }

    pub fn history_for_commit(
        &mut self,
        reference: &str,
        use_external: bool,
        cancel: &Cancellation,
    ) -> Result<Snapshot> {
        cancel.check()?;
        let id = self.mirror.resolve(reference)?;
        let meta = self.mirror.commit(&id)?;
        self.oracle.snapshot(&self.mirror, &meta, use_external, cancel)
    }

    pub fn list_remote_branches(&self, cancel: &Cancellation) -> Result<Vec<String>> {
        self.provider
            .list_remote_branches(&self.url, &self.credentials, cancel)
    }

    pub fn close(self) {
        debug!(url = %self.url, "session closed");
    }
}

/// Opens the mirror at `path`, recreating it once if it cannot be opened.
fn open_mirror<P: VcsProvider>(
    provider: &P,
    url: &str,
    credentials: &Credentials,
    path: &Path,
    cancel: &Cancellation,
) -> Result<P::Mirror> {
    if path.exists() {
        match provider.open(path) {
            Ok(mirror) => return Ok(mirror),
            Err(e) => {
                let corrupt = RepoStatError::CorruptMirror {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                };
                warn!(error = %corrupt, "recreating mirror");
                fs::remove_dir_all(path)?;
            }
        }
    }

    provider
        .clone_mirror(url, path, credentials, cancel)
        .map_err(|e| match e {
            RepoStatError::Cancelled => RepoStatError::Cancelled,
            RepoStatError::Connectivity(msg) => RepoStatError::Connectivity(msg),
            other => RepoStatError::Connectivity(format!("{url}: {other}")),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ExternalCounter;
    use crate::testing::{day, FakeProvider, FakeRepoBuilder, SharedRemote};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const URL: &str = "https://example.com/widgets.git";

    fn config(dir: &TempDir) -> SessionConfig {
        SessionConfig::default()
            .with_cache_dir(dir.path())
            .with_external_counter(false)
    }

    fn open(remote: &SharedRemote, dir: &TempDir) -> RepositorySession<FakeProvider> {
        RepositorySession::open_with(
            FakeProvider::new(remote),
            URL,
            Credentials::anonymous(),
            config(dir),
            &Cancellation::new(),
        )
        .unwrap()
    }

    /// root adds 10 lines; alice's commit is +5/-2; bob merges a side branch.
    fn scenario() -> SharedRemote {
        let ten = "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n";
        let alice = "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\na\nb\nc\n";
        FakeRepoBuilder::new()
            .commit("root", &[], "rooter", 1, &[("src/main.rs", ten)])
            .commit("c2", &["root"], "alice", 2, &[("src/main.rs", alice), ("notes.md", "x\ny\nz\n")])
            .commit("side", &["root"], "carol", 3, &[("src/main.rs", ten), ("lib.py", "p\nq\n")])
            .commit(
                "merge",
                &["c2", "side"],
                "bob",
                4,
                &[("src/main.rs", alice), ("notes.md", "x\ny\nz\n"), ("lib.py", "p\nq\n")],
            )
            .branch("main", "merge")
            .build()
    }

    #[test]
    fn ledgers_follow_authors_and_merges_are_weighted_per_parent() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        let mut session = open(&remote, &dir);
        let report = session.sync(&SyncOptions::default(), &Cancellation::new()).unwrap();
        assert_eq!(report.new_commits, 4);

        let alice = session.ledger_for("main", "alice", Role::Author, None).unwrap();
        assert_eq!(alice.commit_count(), 1);
        // alice: three lines appended to main.rs plus a three-line file added
        let alice_record = alice.get_by_id("c2").unwrap();
        assert_eq!((alice.additions(), alice.deletions()), (alice_record.additions, alice_record.deletions));

        let bob = session.ledger_for("main", "bob", Role::Author, None).unwrap();
        let merge = bob.get_by_id("merge").unwrap();
        assert!(merge.is_merge);
        // vs c2: lib.py added (+2); vs side: main.rs and notes.md as in c2
        assert_eq!(merge.additions, 2 + alice_record.additions);
        assert_eq!(merge.deletions, alice_record.deletions);
        assert_eq!(bob.additions(), merge.additions);

        let root = session
            .ledger_for("main", "rooter", Role::Author, None)
            .unwrap();
        assert_eq!((root.additions(), root.deletions()), (10, 0));
    }

    #[test]
    fn alice_plus_five_minus_two() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FakeRepoBuilder::new()
            .commit("root", &[], "rooter", 1, &[("a.txt", "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n")])
            .commit("c2", &["root"], "alice", 2, &[("a.txt", "1\n2\n3\n4\n5\n6\n7\n8\nA\nB\nC\nD\nE\n")])
            .branch("main", "c2")
            .build();
        let mut session = open(&remote, &dir);
        session.sync(&SyncOptions::default(), &Cancellation::new()).unwrap();

        let alice = session.ledger_for("main", "alice", Role::Author, None).unwrap();
        assert_eq!((alice.commit_count(), alice.additions(), alice.deletions()), (1, 5, 2));
    }

    #[test]
    fn resync_without_upstream_change_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        let mut session = open(&remote, &dir);
        let cancel = Cancellation::new();

        session.sync(&SyncOptions::default(), &cancel).unwrap();
        let before = session.branch_snapshot("main").unwrap().clone();

        let report = session.sync(&SyncOptions::default(), &cancel).unwrap();
        assert_eq!(report.new_commits, 0);
        assert_eq!(report.unchanged, vec!["main".to_string()]);

        let forced = SyncOptions { force: true, ..SyncOptions::default() };
        let report = session.sync(&forced, &cancel).unwrap();
        assert_eq!(report.new_commits, 0);

        let after = session.branch_snapshot("main").unwrap();
        assert_eq!(after.file_count(), before.file_count());
        assert_eq!(after.line_count(), before.line_count());
        assert_eq!(after.commit_count(), before.commit_count());
    }

    #[test]
    fn incremental_sync_only_processes_new_commits() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        let mut session = open(&remote, &dir);
        let cancel = Cancellation::new();
        session.sync(&SyncOptions::default(), &cancel).unwrap();

        {
            let mut r = remote.lock().unwrap();
            r.commit("c5", &["merge"], "alice", 5, &[("src/main.rs", "only\n")]);
            r.set_branch("main", "c5");
        }
        let report = session.sync(&SyncOptions::default(), &cancel).unwrap();
        assert_eq!(report.new_commits, 1);

        let branch = session.branch_snapshot("main").unwrap();
        assert_eq!(branch.last_processed(), Some("c5"));
        assert_eq!(branch.ledger("alice", Role::Author).unwrap().commit_count(), 2);
        assert_eq!(branch.file_count(), 1);
        assert_eq!(branch.line_count(), 1);
    }

    #[test]
    fn vanished_branches_are_pruned_and_unknown_ones_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        remote.lock().unwrap().set_branch("feature", "side");
        let mut session = open(&remote, &dir);
        let cancel = Cancellation::new();

        session.sync(&SyncOptions::default(), &cancel).unwrap();
        assert_eq!(session.branches(), vec!["feature", "main"]);

        remote.lock().unwrap().delete_branch("feature");
        let report = session.sync(&SyncOptions::default(), &cancel).unwrap();
        assert_eq!(report.pruned, vec!["feature".to_string()]);
        assert_eq!(session.branches(), vec!["main"]);

        assert!(matches!(
            session.branch_snapshot("feature"),
            Err(RepoStatError::BranchNotFound(_))
        ));
        assert!(matches!(
            session.sync(&SyncOptions::branch("nope"), &cancel),
            Err(RepoStatError::BranchNotFound(_))
        ));
    }

    #[test]
    fn fetch_failure_keeps_stale_data() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        let mut session = open(&remote, &dir);
        let cancel = Cancellation::new();
        session.sync(&SyncOptions::default(), &cancel).unwrap();

        {
            let mut r = remote.lock().unwrap();
            r.fail_fetch = true;
            r.commit("c5", &["merge"], "alice", 5, &[("x.rs", "1\n")]);
            r.set_branch("main", "c5");
        }
        let report = session.sync(&SyncOptions::default(), &cancel).unwrap();
        assert!(report.fetch_failed);
        assert_eq!(report.new_commits, 0);
        assert_eq!(session.branch_snapshot("main").unwrap().last_processed(), Some("merge"));
    }

    #[test]
    fn refs_only_sync_lists_branches_without_stats() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        let mut session = open(&remote, &dir);
        let options = SyncOptions { compute_stats: false, ..SyncOptions::default() };
        session.sync(&options, &Cancellation::new()).unwrap();

        let main = session.branch_snapshot("main").unwrap();
        assert_eq!(main.commit_count(), 0);
        assert!(main.snapshot().is_empty());
    }

    #[test]
    fn history_before_first_commit_is_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        let mut session = open(&remote, &dir);
        let cancel = Cancellation::new();
        session.sync(&SyncOptions::default(), &cancel).unwrap();

        let snapshot = session.history_for_date(day(-30), false, &cancel).unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[test]
    fn history_picks_latest_commit_across_branches() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        remote.lock().unwrap().set_branch("feature", "side");
        let mut session = open(&remote, &dir);
        let cancel = Cancellation::new();
        session.sync(&SyncOptions::default(), &cancel).unwrap();

        // day 3 is "side", reachable only from feature and via the merge
        let snapshot = session.reconstruct_at(day(3), false, &cancel).unwrap();
        assert_eq!(snapshot.commit_id.as_deref(), Some("side"));
        assert_eq!(snapshot.file_count, 2);
        assert_eq!(snapshot.line_count, 12);

        let at_root = session.history_for_commit("root", false, &cancel).unwrap();
        assert_eq!(at_root.line_count, 10);
        assert!(matches!(
            session.history_for_commit("deadbeef", false, &cancel),
            Err(RepoStatError::CommitNotFound(_))
        ));
    }

    #[test]
    fn unavailable_external_counter_reports_builtin_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        let mut session = open(&remote, &dir)
            .with_oracle(LineCountOracle::with_external(ExternalCounter::new("/no/such/cloc")));
        session.sync(&SyncOptions::default(), &Cancellation::new()).unwrap();

        let main = session.branch_snapshot("main").unwrap();
        assert!(!main.uses_external_counter());
        assert_eq!(main.line_count(), 13 + 3 + 2);
        assert_eq!(main.file_count(), 3);
    }

    #[test]
    fn corrupt_mirror_is_recloned_once() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        drop(open(&remote, &dir));
        assert_eq!(remote.lock().unwrap().clones, 1);

        remote.lock().unwrap().fail_open = 1;
        let session = open(&remote, &dir);
        assert_eq!(remote.lock().unwrap().clones, 2);
        session.close();

        let reopened = open(&remote, &dir);
        assert_eq!(remote.lock().unwrap().clones, 2);
        reopened.close();
    }

    #[test]
    fn failed_reclone_is_a_connectivity_error() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        drop(open(&remote, &dir));
        {
            let mut r = remote.lock().unwrap();
            r.fail_open = 1;
            r.fail_clone = true;
        }
        let result = RepositorySession::open_with(
            FakeProvider::new(&remote),
            URL,
            Credentials::anonymous(),
            config(&dir),
            &Cancellation::new(),
        );
        assert!(matches!(result, Err(RepoStatError::Connectivity(_))));
    }

    #[test]
    fn windowed_queries_leave_session_data_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        let mut session = open(&remote, &dir);
        session.sync(&SyncOptions::default(), &Cancellation::new()).unwrap();

        let interval = DateInterval::new().with_since(day(3));
        let window = session.branch_window(&interval);
        let main = window.data()[0];
        assert_eq!(main.commit_count(), 2);
        assert!(main.ledger("alice", Role::Author).unwrap().is_limited());

        let visible = session
            .ledgers("main", Role::Author, SortBy::Name, Some(&interval))
            .unwrap();
        let names: Vec<&str> = visible.iter().map(|l| l.identity().name.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol"]);

        assert_eq!(session.branch_snapshot("main").unwrap().commit_count(), 4);
        assert!(matches!(
            session.ledger_for("main", "nobody", Role::Author, None),
            Err(RepoStatError::IdentityNotFound(_))
        ));
    }

    #[test]
    fn cancelled_sync_leaves_no_partial_state() {
        let dir = tempfile::tempdir().unwrap();
        let remote = scenario();
        let mut session = open(&remote, &dir);
        let cancel = Cancellation::new();
        cancel.cancel();
        assert!(matches!(
            session.sync(&SyncOptions::default(), &cancel),
            Err(RepoStatError::Cancelled)
        ));
        assert!(session.branches().is_empty());
    }
}
