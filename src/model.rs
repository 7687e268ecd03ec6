use crate::language::Language;
use crate::window::{InRange, Nestable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Inclusive date interval. Either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateInterval {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateInterval {
    pub fn new() -> Self {
        Self { since: None, until: None }
    }

    pub fn between(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since: Some(since), until: Some(until) }
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.since.is_some() || self.until.is_some()
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if timestamp < &since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if timestamp > &until {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into() }
    }

    pub fn matches(&self, needle: &str) -> bool {
        self.name == needle || self.email.eq_ignore_ascii_case(needle)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Author,
    Committer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Commits,
    Additions,
    Deletions,
    Name,
}

/// Change statistics for one commit. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub is_merge: bool,
    pub message: String,
    pub author: Identity,
    pub committer: Identity,
}

impl InRange for CommitRecord {
    fn in_range(&self, interval: &DateInterval) -> bool {
        interval.contains(&self.timestamp)
    }
}

impl Nestable for CommitRecord {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub files: u64,
    pub blank: u64,
    pub comment: u64,
    pub code: u64,
}

impl LanguageStats {
    pub fn lines(&self) -> u64 {
        self.blank + self.comment + self.code
    }
}

/// File/line/language aggregate of a single tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub commit_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub file_count: u64,
    pub line_count: u64,
    pub languages: BTreeMap<Language, LanguageStats>,
    pub uses_external_counter: bool,
    pub elapsed_seconds: Option<f64>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.commit_id.is_none() && self.file_count == 0 && self.line_count == 0
    }
}

impl InRange for Snapshot {
    fn in_range(&self, interval: &DateInterval) -> bool {
        match &self.timestamp {
            Some(ts) => interval.contains(ts),
            None => !interval.is_bounded(),
        }
    }
}

impl Nestable for Snapshot {}
