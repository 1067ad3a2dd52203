//! Workspace orchestration engine.
//!
//! Coordinates the three external resources behind every logical workspace
//! (a git worktree, a tmux window, a persisted record) so they stay mutually
//! consistent across crashes, manual interference, and concurrent
//! invocations. The dashboard and CLI layers drive this crate and never
//! touch git, tmux, or the state document directly.

pub mod conflicts;
pub mod doctor;
pub mod error;
pub mod graph;
pub mod instance;
pub mod manager;
pub mod publish;
pub mod reconcile;
pub mod session;
pub mod subpane;

pub use conflicts::ConflictDetector;
pub use doctor::{check_all, has_critical_problems, ToolCheck};
pub use error::{Error, Result};
pub use graph::{has_cycle, topological_sort};
pub use instance::{sanitize_branch, CreateOpts, StatusProbe};
pub use manager::Manager;
pub use publish::{detect_review_tool, title_from_branch, ReviewTool};
pub use reconcile::ReconcileReport;
