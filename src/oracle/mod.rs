//! Line counting for a branch tip or any single commit.
//!
//! The built-in strategy works from the commit's diff against the empty tree
//! and is always available. The external strategy runs a `cloc`-compatible
//! tool over a materialised copy of the tree; whenever it cannot produce a
//! report the oracle falls back to the built-in numbers.

pub mod builtin;
pub mod external;
pub mod report;

use crate::cancel::Cancellation;
use crate::config::SessionConfig;
use crate::error::{RepoStatError, Result};
use crate::git::{CommitMeta, Mirror};
use crate::model::Snapshot;
use tracing::{debug, warn};

pub use external::ExternalCounter;
pub use report::{ClocHeader, ClocReport};

#[derive(Debug, Clone, Default)]
pub struct LineCountOracle {
    external: Option<ExternalCounter>,
}

impl LineCountOracle {
    pub fn builtin() -> Self {
        Self { external: None }
    }

    pub fn with_external(counter: ExternalCounter) -> Self {
        Self { external: Some(counter) }
    }

    /// Looks the configured tool up on `PATH` once; a missing tool leaves
    /// only the built-in strategy.
    pub fn from_config(config: &SessionConfig) -> Self {
        if !config.use_external_counter {
            return Self::builtin();
        }
        match ExternalCounter::detect(&config.line_counter_tool) {
            Some(counter) => Self::with_external(counter),
            None => {
                debug!(tool = %config.line_counter_tool, "external line counter not installed");
                Self::builtin()
            }
        }
    }

    pub fn has_external(&self) -> bool {
        self.external.is_some()
    }

    pub fn snapshot<M: Mirror + ?Sized>(
        &self,
        mirror: &M,
        commit: &CommitMeta,
        use_external: bool,
        cancel: &Cancellation,
    ) -> Result<Snapshot> {
        if let (true, Some(counter)) = (use_external, &self.external) {
            match counter.count(mirror, &commit.id, cancel) {
                Ok(report) => return Ok(report.into_snapshot(commit)),
                Err(RepoStatError::Cancelled) => return Err(RepoStatError::Cancelled),
                Err(e) => {
                    warn!(commit = %commit.id, error = %e, "external line count failed, using built-in count");
                }
            }
        }
        builtin::snapshot(mirror, commit)
    }
}
