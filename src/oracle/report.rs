//! Reader for the line counter's YAML report.
//!
//! The report is a stream of flat two-level documents: a `header` section,
//! one section per language, and a `SUM` section that is ignored in favour
//! of the per-language figures. Only that shape is understood here.

use crate::error::{RepoStatError, Result};
use crate::git::CommitMeta;
use crate::language::Language;
use crate::model::{LanguageStats, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

const HEADER: &str = "header";
const SUM: &str = "SUM";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClocHeader {
    pub elapsed_seconds: f64,
    pub n_files: u64,
    pub n_lines: u64,
    pub files_per_second: f64,
    pub lines_per_second: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClocReport {
    pub header: ClocHeader,
    pub languages: BTreeMap<Language, LanguageStats>,
}

type Sections = Vec<(String, BTreeMap<String, String>)>;

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(s)
}

fn split_sections(text: &str) -> Result<Sections> {
    let mut sections: Sections = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed == "---" || trimmed == "..." {
            continue;
        }
        let (key, value) = trimmed.split_once(':').ok_or_else(|| {
            RepoStatError::Parse(format!("line {}: expected `key: value`", lineno + 1))
        })?;

        if line.starts_with(char::is_whitespace) {
            let (_, fields) = sections.last_mut().ok_or_else(|| {
                RepoStatError::Parse(format!("line {}: field outside of a section", lineno + 1))
            })?;
            fields.insert(unquote(key).to_string(), unquote(value).to_string());
        } else {
            sections.push((unquote(key).to_string(), BTreeMap::new()));
        }
    }
    Ok(sections)
}

fn number<T: std::str::FromStr + Default>(fields: &BTreeMap<String, String>, keys: &[&str]) -> Result<T> {
    match keys.iter().find_map(|k| fields.get(*k)) {
        Some(raw) => raw
            .parse()
            .map_err(|_| RepoStatError::Parse(format!("`{}` is not a number: {raw}", keys[0]))),
        None => Ok(T::default()),
    }
}

impl ClocReport {
    pub fn parse(text: &str) -> Result<Self> {
        let mut header = None;
        let mut languages = BTreeMap::new();

        for (name, fields) in split_sections(text)? {
            match name.as_str() {
                HEADER => {
                    header = Some(ClocHeader {
                        elapsed_seconds: number(&fields, &["elapsed_seconds"])?,
                        n_files: number(&fields, &["n_files"])?,
                        n_lines: number(&fields, &["n_lines"])?,
                        files_per_second: number(&fields, &["files_per_second"])?,
                        lines_per_second: number(&fields, &["lines_per_second"])?,
                    });
                }
                SUM => {}
                _ => {
                    let stats = LanguageStats {
                        files: number(&fields, &["n_files", "nFiles"])?,
                        blank: number(&fields, &["blank"])?,
                        comment: number(&fields, &["comment"])?,
                        code: number(&fields, &["code"])?,
                    };
                    languages.insert(Language::from_name(&name), stats);
                }
            }
        }

        let header = header.ok_or_else(|| RepoStatError::Parse("report has no header".to_string()))?;
        Ok(Self { header, languages })
    }

    pub fn total(&self) -> LanguageStats {
        self.languages.values().fold(LanguageStats::default(), |acc, s| LanguageStats {
            files: acc.files + s.files,
            blank: acc.blank + s.blank,
            comment: acc.comment + s.comment,
            code: acc.code + s.code,
        })
    }

    pub fn into_snapshot(self, commit: &CommitMeta) -> Snapshot {
        let total = self.total();
        if total.files != self.header.n_files || total.lines() != self.header.n_lines {
            debug!(
                header_files = self.header.n_files,
                header_lines = self.header.n_lines,
                language_files = total.files,
                language_lines = total.lines(),
                "line counter header disagrees with per-language totals"
            );
        }
        Snapshot {
            commit_id: Some(commit.id.clone()),
            timestamp: Some(commit.timestamp),
            file_count: self.header.n_files,
            line_count: self.header.n_lines,
            languages: self.languages,
            uses_external_counter: true,
            elapsed_seconds: Some(self.header.elapsed_seconds),
        }
    }
}
