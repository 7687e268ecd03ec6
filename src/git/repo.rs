use super::branch::{trim_prefix, HEADS_PREFIX};
use super::{CommitMeta, FileChange, Hunk, Mirror, VcsProvider};
use crate::cancel::Cancellation;
use crate::config::Credentials;
use crate::error::{RepoStatError, Result};
use crate::model::Identity;
use crate::process;
use chrono::{DateTime, Utc};
use gix::object::tree::diff::ChangeDetached;
use gix::objs::tree::EntryMode;
use gix::revision::walk::Sorting;
use gix::traverse::commit::simple::CommitTimeOrder;
use gix::{ObjectId, Repository};
use similar::{DiffTag, TextDiff};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

const ENV_USERNAME: &str = "REPOSTAT_GIT_USERNAME";
const ENV_PASSWORD: &str = "REPOSTAT_GIT_PASSWORD";
const CREDENTIAL_HELPER: &str = "credential.helper=!f() { echo \"username=${REPOSTAT_GIT_USERNAME}\"; echo \"password=${REPOSTAT_GIT_PASSWORD}\"; }; f";
const BRANCH_REFSPEC: &str = "+refs/heads/*:refs/heads/*";
const BINARY_PROBE_LEN: usize = 8192;

/// Reads history through gix; clone, fetch and ls-remote go through the
/// `git` executable so credentials and transports behave like the user's git.
#[derive(Debug, Clone, Default)]
pub struct GitProvider;

impl GitProvider {
    pub fn new() -> Self {
        Self
    }
}

fn git_command(credentials: &Credentials) -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    if !credentials.is_anonymous() {
        cmd.env(ENV_USERNAME, &credentials.username)
            .env(ENV_PASSWORD, &credentials.password)
            .args(["-c", "credential.helper=", "-c", CREDENTIAL_HELPER]);
    }
    cmd
}

fn run_network(cmd: Command, what: &str, cancel: &Cancellation) -> Result<process::Output> {
    let out = process::run(cmd, cancel)?;
    if !out.status.success() {
        return Err(RepoStatError::Connectivity(format!(
            "git {what} failed: {}",
            out.stderr_lossy()
        )));
    }
    Ok(out)
}

impl VcsProvider for GitProvider {
    type Mirror = GitMirror;

    fn kind(&self) -> &'static str {
        "git"
    }

    fn open(&self, path: &Path) -> Result<GitMirror> {
        GitMirror::open(path)
    }

    fn clone_mirror(
        &self,
        url: &str,
        dest: &Path,
        credentials: &Credentials,
        cancel: &Cancellation,
    ) -> Result<GitMirror> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        info!(url, dest = %dest.display(), "cloning mirror");

        let mut cmd = git_command(credentials);
        cmd.args(["clone", "--mirror", "--quiet", url]).arg(dest);
        if let Err(e) = run_network(cmd, "clone", cancel) {
            let _ = fs::remove_dir_all(dest);
            return Err(e);
        }
        GitMirror::open(dest)
    }

    fn list_remote_branches(
        &self,
        url: &str,
        credentials: &Credentials,
        cancel: &Cancellation,
    ) -> Result<Vec<String>> {
        let mut cmd = git_command(credentials);
        cmd.args(["ls-remote", "--heads", url]);
        let out = run_network(cmd, "ls-remote", cancel)?;
        Ok(parse_ls_remote(&out.stdout_lossy()))
    }
}

fn parse_ls_remote(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(_, reference)| reference.trim())
        .filter(|reference| reference.starts_with(HEADS_PREFIX))
        .map(|reference| trim_prefix(reference).to_string())
        .collect()
}

pub struct GitMirror {
    repo: Repository,
    path: PathBuf,
}

impl GitMirror {
    pub fn open(path: &Path) -> Result<Self> {
        let repo = gix::open(path)?;
        Ok(Self { repo, path: path.to_path_buf() })
    }

    fn parse_id(&self, id: &str) -> Result<ObjectId> {
        ObjectId::from_hex(id.as_bytes()).map_err(|_| RepoStatError::CommitNotFound(id.to_string()))
    }

    fn commit_meta(&self, id: ObjectId) -> Result<CommitMeta> {
        let commit = self
            .repo
            .find_commit(id)
            .map_err(|_| RepoStatError::CommitNotFound(id.to_string()))?;
        let secs = commit.time()?.seconds;
        let timestamp = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| RepoStatError::InvalidDate(format!("Invalid timestamp: {secs}")))?;
        let author = commit.author()?;
        let committer = commit.committer()?;
        let message = commit.message()?;

        Ok(CommitMeta {
            id: id.to_string(),
            parents: commit.parent_ids().map(|p| p.to_string()).collect(),
            author: Identity::new(author.name.to_string(), author.email.to_string()),
            committer: Identity::new(committer.name.to_string(), committer.email.to_string()),
            timestamp,
            message: message.summary().to_string(),
        })
    }

    /// Ids reachable from `tip` but not from `hidden`, newest first.
    fn walk_ids(&self, tip: ObjectId, hidden: Option<ObjectId>) -> Result<Vec<ObjectId>> {
        let walk = self
            .repo
            .rev_walk([tip])
            .with_hidden(hidden)
            .all()
            .map_err(RepoStatError::git)?;
        let mut ids = Vec::new();
        for info in walk {
            let info = info.map_err(RepoStatError::git)?;
            ids.push(info.id);
        }
        Ok(ids)
    }

    fn handle_change(&self, change: ChangeDetached, files: &mut Vec<FileChange>) -> Result<()> {
        match change {
            ChangeDetached::Addition { id, location, entry_mode, .. } => {
                if is_file(entry_mode) {
                    let new = self.repo.find_object(id)?;
                    files.push(file_change(location.to_string(), &[], &new.data));
                }
            }
            ChangeDetached::Deletion { id, location, entry_mode, .. } => {
                if is_file(entry_mode) {
                    let old = self.repo.find_object(id)?;
                    files.push(file_change(location.to_string(), &old.data, &[]));
                }
            }
            ChangeDetached::Modification {
                previous_id,
                id,
                location,
                entry_mode,
                ..
            } => {
                if is_file(entry_mode) {
                    let old = self.repo.find_object(previous_id)?;
                    let new = self.repo.find_object(id)?;
                    files.push(file_change(location.to_string(), &old.data, &new.data));
                }
            }
            ChangeDetached::Rewrite {
                source_id,
                id,
                location,
                entry_mode,
                copy,
                ..
            } => {
                if is_file(entry_mode) {
                    let new = self.repo.find_object(id)?;
                    if copy {
                        files.push(file_change(location.to_string(), &[], &new.data));
                    } else {
                        let old = self.repo.find_object(source_id)?;
                        files.push(file_change(location.to_string(), &old.data, &new.data));
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_file(mode: EntryMode) -> bool {
    !(mode.is_tree() || mode.is_commit())
}

fn is_binary(data: &[u8]) -> bool {
    data.iter().take(BINARY_PROBE_LEN).any(|&b| b == 0)
}

fn file_change(path: String, old: &[u8], new: &[u8]) -> FileChange {
    if is_binary(old) || is_binary(new) {
        return FileChange { path, hunks: Vec::new(), is_binary: true };
    }
    FileChange { path, hunks: line_hunks(old, new), is_binary: false }
}

/// Edit regions of a line diff, as `(old range, new range)` pairs.
pub fn line_hunks(old: &[u8], new: &[u8]) -> Vec<Hunk> {
    let old = String::from_utf8_lossy(old);
    let new = String::from_utf8_lossy(new);
    let diff = TextDiff::from_lines(old.as_ref(), new.as_ref());
    diff.ops()
        .iter()
        .filter_map(|op| {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            if tag == DiffTag::Equal {
                return None;
            }
            Some(Hunk::new(
                old_range.start as u32..old_range.end as u32,
                new_range.start as u32..new_range.end as u32,
            ))
        })
        .collect()
}

impl Mirror for GitMirror {
    fn path(&self) -> &Path {
        &self.path
    }

    fn fetch(&self, url: &str, credentials: &Credentials, cancel: &Cancellation) -> Result<()> {
        let mut cmd = git_command(credentials);
        cmd.arg("--git-dir")
            .arg(&self.path)
            .args(["fetch", "--prune", "--quiet", url, BRANCH_REFSPEC]);
        run_network(cmd, "fetch", cancel)?;
        debug!(path = %self.path.display(), "fetched");
        Ok(())
    }

    fn branch_tips(&self) -> Result<BTreeMap<String, String>> {
        let refs = self.repo.references().map_err(RepoStatError::git)?;
        let branches = refs.local_branches().map_err(RepoStatError::git)?;

        let mut tips = BTreeMap::new();
        for reference in branches.flatten() {
            let name = reference.name().as_bstr().to_string();
            if let Some(id) = reference.try_id() {
                tips.insert(trim_prefix(&name).to_string(), id.to_string());
            }
        }
        Ok(tips)
    }

    fn resolve(&self, reference: &str) -> Result<String> {
        let id = self
            .repo
            .rev_parse_single(reference)
            .map_err(|_| RepoStatError::CommitNotFound(reference.to_string()))?;
        Ok(id.detach().to_string())
    }

    fn commit(&self, id: &str) -> Result<CommitMeta> {
        let oid = self.parse_id(id)?;
        self.commit_meta(oid)
    }

    fn rev_walk(&self, tip: &str, hidden: Option<&str>) -> Result<Vec<CommitMeta>> {
        let tip = self.parse_id(tip)?;
        let hidden = hidden.map(|id| self.parse_id(id)).transpose()?;

        let mut commits = self
            .walk_ids(tip, hidden)?
            .into_iter()
            .map(|id| self.commit_meta(id))
            .collect::<Result<Vec<_>>>()?;
        // walk order is newest-first; stable sort keeps that order among equal stamps
        commits.reverse();
        commits.sort_by_key(|c| c.timestamp);
        Ok(commits)
    }

    fn latest_at(&self, tip: &str, date: DateTime<Utc>) -> Result<Option<CommitMeta>> {
        let walk = self
            .repo
            .rev_walk([self.parse_id(tip)?])
            .sorting(Sorting::ByCommitTime(CommitTimeOrder::NewestFirst))
            .all()
            .map_err(RepoStatError::git)?;
        for info in walk {
            let info = info.map_err(RepoStatError::git)?;
            let secs = match info.commit_time {
                Some(secs) => secs,
                None => self.commit_meta(info.id)?.timestamp.timestamp(),
            };
            if secs <= date.timestamp() {
                return self.commit_meta(info.id).map(Some);
            }
        }
        Ok(None)
    }

    fn diff_tree(&self, old: Option<&str>, new: &str) -> Result<Vec<FileChange>> {
        let new_tree = self.repo.find_commit(self.parse_id(new)?)?.tree()?;
        let old_tree = match old {
            Some(old) => Some(self.repo.find_commit(self.parse_id(old)?)?.tree()?),
            None => None,
        };

        let changes: Vec<ChangeDetached> =
            self.repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), None)?;

        let mut files = Vec::new();
        for change in changes {
            self.handle_change(change, &mut files)?;
        }
        Ok(files)
    }

    fn checkout(&self, commit: &str, dest: &Path) -> Result<()> {
        let tree = self.repo.find_commit(self.parse_id(commit)?)?.tree()?;
        let mut recorder = gix::traverse::tree::Recorder::default();
        tree.traverse()
            .breadthfirst(&mut recorder)
            .map_err(RepoStatError::git)?;

        fs::create_dir_all(dest)?;
        for entry in recorder.records {
            if !entry.mode.is_blob() {
                continue;
            }
            let target = dest.join(entry.filepath.to_string());
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let blob = self.repo.find_object(entry.oid)?;
            fs::write(&target, &blob.data)?;
        }
        Ok(())
    }
}
