//! The persisted data model.
//!
//! Keys are snake_case; optional fields decode as their zero values so
//! documents written by older builds stay readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an instance.
///
/// `Merged` and `Done` are terminal with respect to the agent; the record
/// persists until explicit deletion. `Error` is non-fatal: delete or
/// recreate are the valid follow-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Running,
    Idle,
    Paused,
    Error,
    Merged,
    Done,
}

impl Status {
    /// Whether this state satisfies a dependency edge pointing at it.
    pub fn is_complete(self) -> bool {
        matches!(self, Status::Merged | Status::Done)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Running => "running",
            Status::Idle => "idle",
            Status::Paused => "paused",
            Status::Error => "error",
            Status::Merged => "merged",
            Status::Done => "done",
        };
        f.pad(s)
    }
}

/// A secondary terminal pane attached to an instance's window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubPane {
    pub pane_id: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// One logical workspace: a git worktree, a tmux window, and this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Opaque unique token, six lowercase hex characters.
    pub id: String,
    /// Display label; mutable, never used as identity.
    pub name: String,
    pub branch: String,
    pub base_branch: String,
    pub worktree_path: std::path::PathBuf,
    pub window_id: String,
    pub primary_pane_id: String,
    #[serde(default)]
    pub sub_panes: Vec<SubPane>,
    /// Best-effort PID of the agent; may be the hosting shell's child.
    #[serde(default)]
    pub agent_pid: i32,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default)]
    pub conflicts_with: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// The single persisted document for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRoot {
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl StoreRoot {
    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn instance_mut(&mut self, id: &str) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_instance() -> Instance {
        Instance {
            id: "a1b2c3".into(),
            name: "feat-x".into(),
            branch: "feat/x".into(),
            base_branch: "main".into(),
            worktree_path: "/repo/.worktrees/feat-x".into(),
            window_id: "@3".into(),
            primary_pane_id: "%7".into(),
            sub_panes: vec![],
            agent_pid: 4242,
            status: Status::Running,
            created_at: Utc::now(),
            last_activity: Utc::now(),
            pr_url: None,
            conflicts_with: vec![],
            depends_on: vec![],
        }
    }

    #[test]
    fn status_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Running).unwrap(), "\"running\"");
        assert_eq!(
            serde_json::from_str::<Status>("\"merged\"").unwrap(),
            Status::Merged
        );
    }

    #[test]
    fn completeness_gate() {
        assert!(Status::Merged.is_complete());
        assert!(Status::Done.is_complete());
        assert!(!Status::Running.is_complete());
        assert!(!Status::Error.is_complete());
    }

    #[test]
    fn root_roundtrip() {
        let root = StoreRoot {
            repo: "/repo".into(),
            session: "deck-repo".into(),
            instances: vec![sample_instance()],
        };
        let json = serde_json::to_string_pretty(&root).unwrap();
        let back: StoreRoot = serde_json::from_str(&json).unwrap();
        assert_eq!(root, back);
    }

    #[test]
    fn absent_optionals_decode_as_zero_values() {
        let json = r#"{
            "id": "000001",
            "name": "bare",
            "branch": "b",
            "base_branch": "main",
            "worktree_path": "/w",
            "window_id": "@1",
            "primary_pane_id": "%1",
            "status": "error",
            "created_at": "2025-01-01T00:00:00Z",
            "last_activity": "2025-01-01T00:00:00Z"
        }"#;
        let inst: Instance = serde_json::from_str(json).unwrap();
        assert_eq!(inst.agent_pid, 0);
        assert!(inst.sub_panes.is_empty());
        assert!(inst.pr_url.is_none());
        assert!(inst.conflicts_with.is_empty());
        assert!(inst.depends_on.is_empty());
    }
}
