use super::report::ClocReport;
use crate::cancel::Cancellation;
use crate::error::{RepoStatError, Result};
use crate::git::Mirror;
use crate::process;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// A `cloc`-compatible executable invoked as `<tool> --yaml --skip-hidden <dir>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCounter {
    program: PathBuf,
}

impl ExternalCounter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn detect(tool: &str) -> Option<Self> {
        which::which(tool).ok().map(Self::new)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Materialises `commit` into a scratch directory and counts it.
    pub fn count<M: Mirror + ?Sized>(
        &self,
        mirror: &M,
        commit: &str,
        cancel: &Cancellation,
    ) -> Result<ClocReport> {
        let scratch = tempfile::tempdir()?;
        mirror.checkout(commit, scratch.path())?;
        self.count_dir(scratch.path(), cancel)
    }

    pub fn count_dir(&self, dir: &Path, cancel: &Cancellation) -> Result<ClocReport> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--yaml", "--skip-hidden"]).arg(dir);

        let out = process::run(cmd, cancel).map_err(|e| match e {
            RepoStatError::Cancelled => RepoStatError::Cancelled,
            other => RepoStatError::LineCountUnavailable(format!(
                "{}: {other}",
                self.program.display()
            )),
        })?;
        if !out.status.success() {
            return Err(RepoStatError::LineCountUnavailable(format!(
                "{} exited with {}: {}",
                self.program.display(),
                out.status,
                out.stderr_lossy()
            )));
        }

        let report = ClocReport::parse(&out.stdout_lossy())
            .map_err(|e| RepoStatError::LineCountUnavailable(e.to_string()))?;
        debug!(
            files = report.header.n_files,
            lines = report.header.n_lines,
            "external line count complete"
        );
        Ok(report)
    }
}
