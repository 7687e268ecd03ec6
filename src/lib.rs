pub mod aggregate;
pub mod branch;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod language;
pub mod ledger;
pub mod model;
pub mod oracle;
pub mod process;
pub mod session;
pub mod window;

#[cfg(test)]
mod testing;

pub use branch::BranchSnapshot;
pub use cancel::Cancellation;
pub use config::{Credentials, SessionConfig};
pub use error::{RepoStatError, Result};
pub use ledger::{Ledger, LedgerBook};
pub use model::{CommitRecord, DateInterval, Identity, Role, Snapshot, SortBy};
pub use session::{RepositorySession, SyncOptions, SyncReport};
pub use window::Window;
