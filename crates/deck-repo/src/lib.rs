//! Typed driver over the git command-line interface.
//!
//! Mirrors the shape of the tmux driver: stateless verbs, one spawn per
//! call, structured parsing of porcelain output, typed failures. The repo
//! root is fixed at construction and every invocation runs with `-C <root>`.

pub mod diff;
pub mod error;
pub mod merge;
pub mod repo;
pub mod worktree;

pub use diff::{DiffFile, DiffStat};
pub use error::{VcsError, VcsResult};
pub use merge::MergeResult;
pub use repo::GitRepo;
pub use worktree::WorktreeInfo;
