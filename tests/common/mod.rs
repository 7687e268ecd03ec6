#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;

pub fn has_git() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    assert!(Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap()
        .success());
}

pub fn init_git_repo(dir: &Path) {
    git(dir, &["init", "--quiet"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(dir, &["config", "core.autocrlf", "false"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Writes `files`, then commits as `author` at `date` (RFC3339).
pub fn commit_as(dir: &Path, author: &str, date: &str, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
    }
    git(dir, &["add", "-A"]);
    assert!(Command::new("git")
        .args(["commit", "--quiet", "-m", &format!("change by {author}")])
        .env("GIT_AUTHOR_NAME", author)
        .env("GIT_AUTHOR_EMAIL", format!("{author}@example.com"))
        .env("GIT_COMMITTER_NAME", author)
        .env("GIT_COMMITTER_EMAIL", format!("{author}@example.com"))
        .env("GIT_AUTHOR_DATE", date)
        .env("GIT_COMMITTER_DATE", date)
        .current_dir(dir)
        .status()
        .unwrap()
        .success());
}

pub fn checkout_new(dir: &Path, branch: &str) {
    git(dir, &["checkout", "--quiet", "-b", branch]);
}

pub fn checkout(dir: &Path, branch: &str) {
    git(dir, &["checkout", "--quiet", branch]);
}

pub fn merge_as(dir: &Path, author: &str, date: &str, branch: &str) {
    assert!(Command::new("git")
        .args(["merge", "--quiet", "--no-ff", branch, "-m", &format!("merge {branch}")])
        .env("GIT_AUTHOR_NAME", author)
        .env("GIT_AUTHOR_EMAIL", format!("{author}@example.com"))
        .env("GIT_COMMITTER_NAME", author)
        .env("GIT_COMMITTER_EMAIL", format!("{author}@example.com"))
        .env("GIT_AUTHOR_DATE", date)
        .env("GIT_COMMITTER_DATE", date)
        .current_dir(dir)
        .status()
        .unwrap()
        .success());
}

/// root (+3), alice (+2/-1 on a.txt).
pub fn two_commit_repo(dir: &Path) {
    init_git_repo(dir);
    commit_as(dir, "rooter", "2024-01-01T12:00:00Z", &[("a.txt", "1\n2\n3\n")]);
    commit_as(dir, "alice", "2024-01-02T12:00:00Z", &[("a.txt", "1\nX\n3\n4\n")]);
}
