//! The error taxonomy surfaced to operators.
//!
//! Every failure carries a distinguishable variant rather than a message to
//! scrape. Adapter failures convert in via `From`; the reconciler degrades
//! its sub-step failures to collected warnings instead of raising them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("agent process {pid} for instance {id} is not alive")]
    NotAlive { id: String, pid: i32 },

    #[error("instance {id} has unmerged dependencies: {unmerged:?}")]
    DependencyBlocksMerge { id: String, unmerged: Vec<String> },

    #[error("merge would conflict in {files:?}")]
    MergeHasConflicts { files: Vec<String> },

    #[error("required tool missing: {0}")]
    ToolMissing(&'static str),

    #[error("{tool} failed: {message}")]
    ReviewToolFailed { tool: &'static str, message: String },

    #[error(transparent)]
    Vcs(#[from] deck_repo::VcsError),

    #[error(transparent)]
    Mux(#[from] deck_mux::MuxError),

    #[error(transparent)]
    State(#[from] deck_state::StateError),

    #[error(transparent)]
    Config(#[from] deck_config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is the store's parse-failure case (`state-corrupt`).
    pub fn is_state_corrupt(&self) -> bool {
        matches!(self, Error::State(deck_state::StateError::Corrupt(_)))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
