//! Startup reconciliation: align stored records with observed reality.
//!
//! Runs before any operator-driven mutation. Decisions are accumulated
//! during a read-only scan and applied afterwards, removals first, so the
//! scan never reads through its own writes.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::warn;

use deck_repo::WorktreeInfo;
use deck_state::Status;

use crate::error::Result;
use crate::instance::process_alive;
use crate::manager::Manager;

/// What a reconciliation pass found and repaired.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// `git worktree repair` ran cleanly.
    pub repaired_worktrees: bool,
    /// `git worktree prune` ran cleanly.
    pub pruned_worktrees: bool,
    /// Instances whose status degraded to `error`.
    pub instances_marked_error: usize,
    /// Instances whose record was dropped because the worktree is gone.
    pub instances_removed: usize,
    /// Worktrees on disk that no instance references. Advisory only; the
    /// reconciler never deletes them.
    pub orphaned_worktrees: Vec<PathBuf>,
    /// Sub-step failures that did not stop the pass.
    pub non_fatal: Vec<String>,
}

impl Manager {
    /// Detect and repair drift between the store and the observed git +
    /// tmux state.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        // Guardrails first: both are best-effort.
        match self.repo().worktree_repair() {
            Ok(()) => report.repaired_worktrees = true,
            Err(e) => report.non_fatal.push(format!("worktree repair failed: {e}")),
        }
        match self.repo().worktree_prune() {
            Ok(()) => report.pruned_worktrees = true,
            Err(e) => report.non_fatal.push(format!("worktree prune failed: {e}")),
        }

        let root = self.store().load()?;
        let worktrees = self.repo().worktree_list()?;
        let by_path: HashMap<&std::path::Path, &WorktreeInfo> =
            worktrees.iter().map(|wt| (wt.path.as_path(), wt)).collect();

        let session_name = self.session_name();
        let mut session_exists = self.mux().has_session(&session_name);

        let mut window_ids: HashSet<String> = HashSet::new();
        if session_exists {
            match self.mux().list_windows(&session_name) {
                Ok(windows) => {
                    window_ids = windows.into_iter().map(|w| w.id).collect();
                }
                Err(e) => {
                    // Cannot enumerate windows: treat the session as gone.
                    session_exists = false;
                    report
                        .non_fatal
                        .push(format!("failed to list windows, treating session as missing: {e}"));
                }
            }
        }

        let mut to_remove: Vec<String> = Vec::new();
        let mut to_mark_error: Vec<String> = Vec::new();

        for inst in &root.instances {
            let worktree_present = by_path.contains_key(inst.worktree_path.as_path());
            if !worktree_present {
                // Worktree gone: the record is unsalvageable. Clean up the
                // window if it survived.
                to_remove.push(inst.id.clone());
                if session_exists && window_ids.contains(&inst.window_id) {
                    if let Err(e) = self.mux().kill_window(&inst.window_id) {
                        report.non_fatal.push(format!(
                            "failed to kill window for removed instance {}: {e}",
                            inst.id
                        ));
                    }
                }
                continue;
            }

            let window_present = session_exists && window_ids.contains(&inst.window_id);
            let pid_alive = process_alive(inst.agent_pid);

            let mut pane_dead = false;
            if window_present {
                match self.mux().list_panes(&inst.window_id) {
                    Ok(panes) => {
                        pane_dead = panes
                            .iter()
                            .find(|p| p.id == inst.primary_pane_id)
                            .map(|p| p.dead)
                            .unwrap_or(false);
                    }
                    Err(e) => {
                        report
                            .non_fatal
                            .push(format!("failed to list panes for {}: {e}", inst.id));
                    }
                }
            }

            let was_active = matches!(inst.status, Status::Running | Status::Paused);
            let degraded = (!window_present && was_active)
                || (inst.status == Status::Running && !pid_alive)
                || (inst.status == Status::Running && pane_dead);

            if degraded {
                to_mark_error.push(inst.id.clone());
            }
        }

        // Orphans: on-disk worktrees no instance references. The main
        // checkout and bare entries are not candidates.
        let referenced: HashSet<&std::path::Path> = root
            .instances
            .iter()
            .map(|i| i.worktree_path.as_path())
            .collect();
        for wt in &worktrees {
            if wt.bare || wt.path == self.repo_root() {
                continue;
            }
            if !referenced.contains(wt.path.as_path()) {
                report.orphaned_worktrees.push(wt.path.clone());
            }
        }

        // Apply: removals first, then per-id mutations.
        for id in &to_remove {
            match self.store().remove_instance(id) {
                Ok(()) => report.instances_removed += 1,
                Err(e) => report.non_fatal.push(format!("failed to remove {id}: {e}")),
            }
        }
        for id in &to_mark_error {
            match self
                .store()
                .update_instance(id, |inst| inst.status = Status::Error)
            {
                Ok(()) => report.instances_marked_error += 1,
                Err(e) => report.non_fatal.push(format!("failed to mark {id}: {e}")),
            }
        }

        for note in &report.non_fatal {
            warn!(target: "deck::core", "{note}");
        }

        Ok(report)
    }

    /// Recovery for the degenerate case: the whole session is gone while
    /// instances exist. Recreates the session and marks every instance
    /// `error`. Agents are deliberately not relaunched; orphaned children
    /// have been re-parented and cannot be reattached.
    ///
    /// Returns whether recovery ran.
    pub fn recover_from_crash(&self) -> Result<bool> {
        let root = self.store().load()?;
        if root.instances.is_empty() {
            return Ok(false);
        }
        if self.session_exists() {
            return Ok(false);
        }

        self.ensure_session()?;
        for inst in &root.instances {
            self.store()
                .update_instance(&inst.id, |i| i.status = Status::Error)?;
        }
        Ok(true)
    }
}
