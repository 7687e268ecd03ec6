//! In-memory plumbing used by unit tests.

use crate::cancel::Cancellation;
use crate::config::Credentials;
use crate::error::{RepoStatError, Result};
use crate::git::repo::line_hunks;
use crate::git::{CommitMeta, FileChange, Mirror, VcsProvider};
use crate::model::Identity;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub type SharedRemote = Arc<Mutex<FakeRemote>>;

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::days(n)
}

pub fn who(name: &str) -> Identity {
    Identity::new(name, format!("{name}@example.com"))
}

struct FakeCommit {
    meta: CommitMeta,
    tree: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct FakeRemote {
    commits: HashMap<String, FakeCommit>,
    branches: BTreeMap<String, String>,
    pub fail_fetch: bool,
    pub fail_clone: bool,
    pub fail_open: usize,
    pub clones: usize,
}

impl FakeRemote {
    #[allow(clippy::too_many_arguments)]
    pub fn commit_as(
        &mut self,
        id: &str,
        parents: &[&str],
        author: &str,
        committer: &str,
        at: i64,
        files: &[(&str, &str)],
    ) {
        let meta = CommitMeta {
            id: id.to_string(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            author: who(author),
            committer: who(committer),
            timestamp: day(at),
            message: format!("commit {id}"),
        };
        let tree = files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();
        self.commits.insert(id.to_string(), FakeCommit { meta, tree });
    }

    pub fn commit(&mut self, id: &str, parents: &[&str], author: &str, at: i64, files: &[(&str, &str)]) {
        self.commit_as(id, parents, author, author, at, files);
    }

    pub fn set_branch(&mut self, name: &str, id: &str) {
        self.branches.insert(name.to_string(), id.to_string());
    }

    pub fn delete_branch(&mut self, name: &str) {
        self.branches.remove(name);
    }

    /// A mirror that has already fetched the remote's current branches.
    pub fn mirror(remote: &SharedRemote) -> FakeMirror {
        let branches = remote.lock().unwrap().branches.clone();
        FakeMirror {
            remote: Arc::clone(remote),
            path: PathBuf::from("/nonexistent"),
            branches: RefCell::new(branches),
        }
    }
}

pub struct FakeRepoBuilder {
    remote: FakeRemote,
}

impl FakeRepoBuilder {
    pub fn new() -> Self {
        Self { remote: FakeRemote::default() }
    }

    pub fn commit(mut self, id: &str, parents: &[&str], author: &str, at: i64, files: &[(&str, &str)]) -> Self {
        self.remote.commit(id, parents, author, at, files);
        self
    }

    pub fn commit_as(
        mut self,
        id: &str,
        parents: &[&str],
        author: &str,
        committer: &str,
        at: i64,
        files: &[(&str, &str)],
    ) -> Self {
        self.remote.commit_as(id, parents, author, committer, at, files);
        self
    }

    pub fn branch(mut self, name: &str, id: &str) -> Self {
        self.remote.set_branch(name, id);
        self
    }

    pub fn build(self) -> SharedRemote {
        Arc::new(Mutex::new(self.remote))
    }
}

pub struct FakeMirror {
    remote: SharedRemote,
    path: PathBuf,
    branches: RefCell<BTreeMap<String, String>>,
}

impl FakeMirror {
    fn with_commit<R>(&self, id: &str, f: impl FnOnce(&FakeCommit) -> R) -> Result<R> {
        let remote = self.remote.lock().unwrap();
        remote
            .commits
            .get(id)
            .map(f)
            .ok_or_else(|| RepoStatError::CommitNotFound(id.to_string()))
    }

    fn ancestors(&self, tip: &str) -> Result<Vec<String>> {
        let remote = self.remote.lock().unwrap();
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([tip.to_string()]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let commit = remote
                .commits
                .get(&id)
                .ok_or_else(|| RepoStatError::CommitNotFound(id.clone()))?;
            queue.extend(commit.meta.parents.iter().cloned());
            order.push(id);
        }
        Ok(order)
    }
}

impl Mirror for FakeMirror {
    fn path(&self) -> &Path {
        &self.path
    }

    fn fetch(&self, _url: &str, _credentials: &Credentials, cancel: &Cancellation) -> Result<()> {
        cancel.check()?;
        let remote = self.remote.lock().unwrap();
        if remote.fail_fetch {
            return Err(RepoStatError::Connectivity("remote unreachable".to_string()));
        }
        *self.branches.borrow_mut() = remote.branches.clone();
        Ok(())
    }

    fn branch_tips(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.branches.borrow().clone())
    }

    fn resolve(&self, reference: &str) -> Result<String> {
        if let Some(tip) = self.branches.borrow().get(reference) {
            return Ok(tip.clone());
        }
        self.with_commit(reference, |c| c.meta.id.clone())
    }

    fn commit(&self, id: &str) -> Result<CommitMeta> {
        self.with_commit(id, |c| c.meta.clone())
    }

    fn rev_walk(&self, tip: &str, hidden: Option<&str>) -> Result<Vec<CommitMeta>> {
        let hidden: BTreeSet<String> = match hidden {
            Some(h) => self.ancestors(h)?.into_iter().collect(),
            None => BTreeSet::new(),
        };
        let mut commits = Vec::new();
        for id in self.ancestors(tip)? {
            if !hidden.contains(&id) {
                commits.push(self.commit(&id)?);
            }
        }
        commits.reverse();
        commits.sort_by_key(|c| c.timestamp);
        Ok(commits)
    }

    fn diff_tree(&self, old: Option<&str>, new: &str) -> Result<Vec<FileChange>> {
        let old_tree = match old {
            Some(id) => self.with_commit(id, |c| c.tree.clone())?,
            None => BTreeMap::new(),
        };
        let new_tree = self.with_commit(new, |c| c.tree.clone())?;

        let paths: BTreeSet<&String> = old_tree.keys().chain(new_tree.keys()).collect();
        let mut changes = Vec::new();
        for path in paths {
            let before = old_tree.get(path).map(String::as_str);
            let after = new_tree.get(path).map(String::as_str);
            if before == after {
                continue;
            }
            changes.push(FileChange {
                path: path.clone(),
                hunks: line_hunks(
                    before.unwrap_or("").as_bytes(),
                    after.unwrap_or("").as_bytes(),
                ),
                is_binary: false,
            });
        }
        Ok(changes)
    }

    fn checkout(&self, commit: &str, dest: &Path) -> Result<()> {
        let tree = self.with_commit(commit, |c| c.tree.clone())?;
        for (path, content) in tree {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, content)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct FakeProvider {
    pub remote: SharedRemote,
}

impl FakeProvider {
    pub fn new(remote: &SharedRemote) -> Self {
        Self { remote: Arc::clone(remote) }
    }
}

impl VcsProvider for FakeProvider {
    type Mirror = FakeMirror;

    fn kind(&self) -> &'static str {
        "fake"
    }

    fn open(&self, path: &Path) -> Result<FakeMirror> {
        let mut remote = self.remote.lock().unwrap();
        if remote.fail_open > 0 {
            remote.fail_open -= 1;
            return Err(RepoStatError::git("bad object header"));
        }
        if !path.join("HEAD").exists() {
            return Err(RepoStatError::git("not a repository"));
        }
        Ok(FakeMirror {
            remote: Arc::clone(&self.remote),
            path: path.to_path_buf(),
            branches: RefCell::new(BTreeMap::new()),
        })
    }

    fn clone_mirror(
        &self,
        _url: &str,
        dest: &Path,
        _credentials: &Credentials,
        cancel: &Cancellation,
    ) -> Result<FakeMirror> {
        cancel.check()?;
        let mut remote = self.remote.lock().unwrap();
        if remote.fail_clone {
            return Err(RepoStatError::Connectivity("remote unreachable".to_string()));
        }
        remote.clones += 1;
        fs::create_dir_all(dest)?;
        fs::write(dest.join("HEAD"), "ref: refs/heads/main\n")?;
        Ok(FakeMirror {
            remote: Arc::clone(&self.remote),
            path: dest.to_path_buf(),
            branches: RefCell::new(remote.branches.clone()),
        })
    }

    fn list_remote_branches(
        &self,
        _url: &str,
        _credentials: &Credentials,
        _cancel: &Cancellation,
    ) -> Result<Vec<String>> {
        Ok(self.remote.lock().unwrap().branches.keys().cloned().collect())
    }
}
