use thiserror::Error;

pub type Result<T> = std::result::Result<T, RepoStatError>;

#[derive(Error, Debug)]
pub enum RepoStatError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    #[error("Corrupt mirror at {path}: {reason}")]
    CorruptMirror { path: String, reason: String },
    #[error("Branch not found: {0}")]
    BranchNotFound(String),
    #[error("Commit not found: {0}")]
    CommitNotFound(String),
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),
    #[error("Line counter unavailable: {0}")]
    LineCountUnavailable(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Git error: {0}")]
    Git(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Open error: {0}")]
    Open(#[from] Box<gix::open::Error>),
    #[error("Object find error: {0}")]
    ObjectFind(#[from] Box<gix::object::find::existing::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
}

impl RepoStatError {
    pub fn git(err: impl std::fmt::Display) -> Self {
        RepoStatError::Git(err.to_string())
    }
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::open::Error> for RepoStatError {
    fn from(err: gix::open::Error) -> Self {
        RepoStatError::Open(Box::new(err))
    }
}

impl From<gix::object::find::existing::Error> for RepoStatError {
    fn from(err: gix::object::find::existing::Error) -> Self {
        RepoStatError::ObjectFind(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for RepoStatError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        RepoStatError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for RepoStatError {
    fn from(err: gix::object::commit::Error) -> Self {
        RepoStatError::Commit(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for RepoStatError {
    fn from(err: gix::objs::decode::Error) -> Self {
        RepoStatError::ObjectDecode(Box::new(err))
    }
}

impl From<gix::repository::diff_tree_to_tree::Error> for RepoStatError {
    fn from(err: gix::repository::diff_tree_to_tree::Error) -> Self {
        RepoStatError::DiffTreeToTree(Box::new(err))
    }
}
