use crate::cancel::Cancellation;
use crate::config::{Credentials, SessionConfig};
use crate::error::RepoStatError;
use crate::ledger::Ledger;
use crate::model::{DateInterval, Role, Snapshot, SortBy};
use crate::session::{RepositorySession, SyncOptions};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use console::style;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

#[derive(Parser)]
#[command(name = "repostat")]
#[command(about = "Contribution ledgers and size history for a remote git repository")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Remote repository URL (or local path)")]
    pub url: String,

    #[arg(long, help = "Directory holding local mirrors")]
    pub cache: Option<PathBuf>,

    #[arg(long, env = "REPOSTAT_USERNAME", help = "Username for the remote")]
    pub username: Option<String>,

    #[arg(long, env = "REPOSTAT_PASSWORD", hide_env_values = true, help = "Password or token for the remote")]
    pub password: Option<String>,

    #[arg(long, help = "Only use the built-in line counter")]
    pub no_external_counter: bool,

    #[arg(long, help = "Give up after this long (e.g. 30s, 5m)")]
    pub timeout: Option<String>,

    #[arg(long, help = "Show a progress spinner while syncing")]
    pub progress: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch and update statistics for every branch (or one)
    Sync {
        #[arg(long, help = "Only sync this branch")]
        branch: Option<String>,

        #[arg(long, help = "Recompute even if the branch tip has not moved")]
        force: bool,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Tip file and line counts per branch
    Branches {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Per-identity totals on a branch
    Ledgers {
        #[arg(long, default_value = "main")]
        branch: String,

        #[arg(long, value_enum, default_value_t = Role::Author)]
        role: Role,

        #[arg(long, value_enum, default_value_t = SortBy::Commits)]
        sort: SortBy,

        #[arg(long, help = "Start date (RFC3339, YYYY-MM-DD, or relative like '90 days ago')")]
        since: Option<String>,

        #[arg(long, help = "End date (RFC3339, YYYY-MM-DD, or relative like '2 weeks ago')")]
        until: Option<String>,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Commits recorded for one identity
    Ledger {
        #[arg(help = "Name or e-mail")]
        identity: String,

        #[arg(long, default_value = "main")]
        branch: String,

        #[arg(long, value_enum, default_value_t = Role::Author)]
        role: Role,

        #[arg(long)]
        since: Option<String>,

        #[arg(long)]
        until: Option<String>,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Per-language breakdown of a branch tip
    Snapshot {
        #[arg(long, default_value = "main")]
        branch: String,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Size of the repository at a date or commit
    History {
        #[arg(long, conflicts_with = "commit", required_unless_present = "commit")]
        date: Option<String>,

        #[arg(long)]
        commit: Option<String>,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Branch names on the remote, without touching the mirror
    RemoteBranches {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

#[derive(Serialize)]
struct LedgerRow<'a> {
    name: &'a str,
    email: &'a str,
    commits: usize,
    additions: u64,
    deletions: u64,
}

impl<'a> From<&'a Ledger> for LedgerRow<'a> {
    fn from(ledger: &'a Ledger) -> Self {
        Self {
            name: &ledger.identity().name,
            email: &ledger.identity().email,
            commits: ledger.commit_count(),
            additions: ledger.additions(),
            deletions: ledger.deletions(),
        }
    }
}

#[derive(Serialize)]
struct BranchRow<'a> {
    name: &'a str,
    tip: Option<&'a str>,
    files: u64,
    lines: u64,
    commits: usize,
    external_counter: bool,
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let cancel = self.common.cancellation()?;
        let use_external = !self.common.no_external_counter;

        match self.command {
            Commands::RemoteBranches { json } => {
                let session = self.common.open(&cancel)?;
                let names = session
                    .list_remote_branches(&cancel)
                    .context("Failed to list remote branches")?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&names)?);
                } else {
                    names.iter().for_each(|n| println!("{n}"));
                }
                session.close();
            }
            Commands::Sync { branch, force, json } => {
                let mut session = self.common.open(&cancel)?;
                let options = SyncOptions { branch, force, use_external_counter: use_external, ..SyncOptions::default() };
                let report = session.sync(&options, &cancel).context("Sync failed")?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    if report.fetch_failed {
                        eprintln!("{} fetch failed, showing local mirror state", style("warning:").yellow().bold());
                    }
                    println!(
                        "{} branch(es) updated, {} unchanged, {} pruned, {} new commit(s)",
                        report.updated.len(),
                        report.unchanged.len(),
                        report.pruned.len(),
                        report.new_commits
                    );
                }
                session.close();
            }
            Commands::Branches { json } => {
                let mut session = self.common.open(&cancel)?;
                let options = SyncOptions { use_external_counter: use_external, ..SyncOptions::default() };
                session.sync(&options, &cancel).context("Sync failed")?;
                let rows: Vec<BranchRow> = session
                    .branches()
                    .into_iter()
                    .filter_map(|name| session.branch_snapshot(name).ok())
                    .map(|b| BranchRow {
                        name: b.name(),
                        tip: b.last_processed(),
                        files: b.file_count(),
                        lines: b.line_count(),
                        commits: b.commit_count(),
                        external_counter: b.uses_external_counter(),
                    })
                    .collect();
                if json {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                } else {
                    output_branches(&rows);
                }
            }
            Commands::Ledgers { branch, role, sort, since, until, json } => {
                let interval = parse_interval(since.as_deref(), until.as_deref())?;
                let mut session = self.common.open(&cancel)?;
                sync_branch(&mut session, &branch, use_external, &cancel)?;
                let ledgers = session.ledgers(&branch, role, sort, Some(&interval))?;
                let rows: Vec<LedgerRow> = ledgers.iter().map(LedgerRow::from).collect();
                if json {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                } else {
                    output_ledgers(&rows);
                }
            }
            Commands::Ledger { identity, branch, role, since, until, json } => {
                let interval = parse_interval(since.as_deref(), until.as_deref())?;
                let mut session = self.common.open(&cancel)?;
                sync_branch(&mut session, &branch, use_external, &cancel)?;
                let ledger = session.ledger_for(&branch, &identity, role, Some(&interval))?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&ledger.commits())?);
                } else {
                    output_ledgers(&[LedgerRow::from(&ledger)]);
                    println!();
                    for c in ledger.commits() {
                        println!(
                            "{} {} {:>6} {:>6}  {}",
                            style(&c.id[..c.id.len().min(10)]).yellow(),
                            c.timestamp.format("%Y-%m-%d"),
                            style(format!("+{}", c.additions)).green(),
                            style(format!("-{}", c.deletions)).red(),
                            c.message.lines().next().unwrap_or("")
                        );
                    }
                }
            }
            Commands::Snapshot { branch, json } => {
                let mut session = self.common.open(&cancel)?;
                sync_branch(&mut session, &branch, use_external, &cancel)?;
                let snapshot = session.branch_snapshot(&branch)?.snapshot();
                output_snapshot(snapshot, json)?;
            }
            Commands::History { date, commit, json } => {
                let mut session = self.common.open(&cancel)?;
                let options = SyncOptions { compute_stats: false, ..SyncOptions::default() };
                session.sync(&options, &cancel).context("Sync failed")?;
                let snapshot = match (commit, date) {
                    (Some(commit), _) => session.history_for_commit(&commit, use_external, &cancel)?,
                    (None, Some(date)) => {
                        let date = parse_date(&date)?;
                        session.history_for_date(date, use_external, &cancel)?
                    }
                    (None, None) => anyhow::bail!("either --date or --commit is required"),
                };
                output_snapshot(&snapshot, json)?;
            }
        }
        Ok(())
    }
}

impl CommonArgs {
    fn credentials(&self) -> Credentials {
        match &self.username {
            Some(user) => Credentials::new(user, self.password.clone().unwrap_or_default()),
            None => Credentials::anonymous(),
        }
    }

    fn config(&self) -> SessionConfig {
        let mut config = SessionConfig::from_env().with_progress(self.progress);
        if let Some(cache) = &self.cache {
            config = config.with_cache_dir(cache);
        }
        if self.no_external_counter {
            config = config.with_external_counter(false);
        }
        config
    }

    fn cancellation(&self) -> Result<Cancellation> {
        match &self.timeout {
            Some(raw) => {
                let timeout = humantime::parse_duration(raw)
                    .with_context(|| format!("Invalid timeout '{raw}'"))?;
                Ok(Cancellation::with_timeout(timeout))
            }
            None => Ok(Cancellation::new()),
        }
    }

    fn open(&self, cancel: &Cancellation) -> Result<RepositorySession> {
        RepositorySession::open(&self.url, self.credentials(), self.config(), cancel)
            .with_context(|| format!("Failed to open repository {}", self.url))
    }
}

fn sync_branch(
    session: &mut RepositorySession,
    branch: &str,
    use_external: bool,
    cancel: &Cancellation,
) -> Result<()> {
    let options = SyncOptions { use_external_counter: use_external, ..SyncOptions::branch(branch) };
    session.sync(&options, cancel).context("Sync failed")?;
    Ok(())
}

fn parse_interval(since: Option<&str>, until: Option<&str>) -> Result<DateInterval> {
    let mut interval = DateInterval::new();
    if let Some(since) = since {
        interval = interval.with_since(parse_date(since)?);
    }
    if let Some(until) = until {
        interval = interval.with_until(parse_date(until)?);
    }
    Ok(interval)
}

/// RFC3339, `YYYY-MM-DD` (midnight UTC), a humantime duration (`90d`,
/// `2weeks`) or `N days|weeks|months ago`, the last two counted back from now.
pub fn parse_date(input: &str) -> crate::error::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&datetime));
        }
    }

    let ago = parse_natural_duration(input)
        .or_else(|| humantime::parse_duration(input.trim().trim_start_matches('-')).ok());
    if let Some(duration) = ago {
        let target = SystemTime::now()
            .checked_sub(duration)
            .ok_or_else(|| RepoStatError::InvalidDate(format!("Duration overflow for '{input}'")))?;
        return Ok(DateTime::<Utc>::from(target));
    }

    Err(RepoStatError::InvalidDate(input.to_string()))
}

fn parse_natural_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();
    let rest = input.strip_suffix(" ago")?;
    let (n, unit) = rest.split_once(' ')?;
    let n: u64 = n.trim().parse().ok()?;
    let days: u64 = match unit.trim().trim_end_matches('s') {
        "day" => 1,
        "week" => 7,
        "month" => 30,
        "year" => 365,
        _ => return None,
    };
    Some(Duration::from_secs(n.checked_mul(days)?.checked_mul(86400)?))
}

fn output_branches(rows: &[BranchRow]) {
    println!(
        "{:<30} {:>8} {:>10} {:>8}  {}",
        style("Branch").bold(),
        style("Files").bold(),
        style("Lines").bold(),
        style("Commits").bold(),
        style("Tip").bold()
    );
    println!("{}", "─".repeat(72));
    for r in rows {
        println!(
            "{:<30} {:>8} {:>10} {:>8}  {}",
            r.name,
            r.files,
            r.lines,
            r.commits,
            r.tip.map(|t| &t[..t.len().min(10)]).unwrap_or("-")
        );
    }
}

fn output_ledgers(rows: &[LedgerRow]) {
    println!(
        "{:<40} {:>8} {:>10} {:>10}",
        style("Identity").bold(),
        style("Commits").bold(),
        style("Added").bold(),
        style("Deleted").bold()
    );
    println!("{}", "─".repeat(71));
    for r in rows {
        println!(
            "{:<40} {:>8} {:>10} {:>10}",
            format!("{} <{}>", r.name, r.email),
            r.commits,
            r.additions,
            r.deletions
        );
    }
}

fn output_snapshot(snapshot: &Snapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }
    match &snapshot.commit_id {
        Some(id) => println!("{} {}", style("commit").bold(), style(id).yellow()),
        None => println!("{}", style("no commits at that point").dim()),
    }
    println!(
        "{} files, {} lines ({} counter)",
        snapshot.file_count,
        snapshot.line_count,
        if snapshot.uses_external_counter { "external" } else { "built-in" }
    );
    if snapshot.languages.is_empty() {
        return Ok(());
    }
    println!();
    println!(
        "{:<24} {:>8} {:>8} {:>8} {:>10}",
        style("Language").bold(),
        style("Files").bold(),
        style("Blank").bold(),
        style("Comment").bold(),
        style("Code").bold()
    );
    println!("{}", "─".repeat(62));
    for (lang, s) in &snapshot.languages {
        println!(
            "{:<24} {:>8} {:>8} {:>8} {:>10}",
            lang.to_string(),
            s.files,
            s.blank,
            s.comment,
            s.code
        );
    }
    Ok(())
}
