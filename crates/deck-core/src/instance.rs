//! Instance lifecycle: create, delete, pause, resume, observe.
//!
//! Every public verb here is a transaction over the worktree, the window,
//! and the store. Partial failure rolls back: compensations run in reverse
//! order of the mutations that preceded them, and the store write is always
//! the final commit point.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use deck_config::Config;
use deck_repo::{DiffFile, DiffStat};
use deck_state::{Instance, Status};

use crate::error::{Error, Result};
use crate::manager::Manager;

/// How long to let the agent process settle before re-reading its PID.
const PID_SETTLE: Duration = Duration::from_millis(100);

/// Inputs to [`Manager::create_instance`].
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Display name; falls back to the branch name.
    pub name: String,
    pub branch: String,
    /// Base for a new branch; falls back to the configured default.
    pub base_branch: String,
    /// Optional command sent to the primary pane after the agent starts.
    pub init_command: String,
}

/// Observed reality for one instance, alongside its stored status.
#[derive(Debug, Clone)]
pub struct StatusProbe {
    pub instance: Instance,
    pub pid_alive: bool,
    pub window_present: bool,
    pub pane_dead: bool,
    pub is_running: bool,
    pub can_pause: bool,
    pub can_resume: bool,
}

impl Manager {
    /// Create a new instance: worktree, window, agent launch, record.
    ///
    /// The external mutations are totally ordered; each step's failure runs
    /// the compensations for everything before it, so the observable state
    /// returns to the pre-call baseline.
    pub fn create_instance(&self, opts: &CreateOpts) -> Result<Instance> {
        if opts.branch.is_empty() {
            return Err(Error::PreconditionFailed("branch name cannot be empty".into()));
        }

        self.check_nested_worktree()?;

        let root = self.store().load()?;
        if root.instances.iter().any(|i| i.branch == opts.branch) {
            return Err(Error::AlreadyExists(format!(
                "an instance already tracks branch {}",
                opts.branch
            )));
        }
        let cap = self.config().ui.max_instances;
        if cap > 0 && root.instances.len() >= cap {
            return Err(Error::PreconditionFailed(format!(
                "instance cap reached ({cap})"
            )));
        }

        let id = deck_state::generate_id();
        let worktree_path = self
            .repo_root()
            .join(&self.config().workspace.worktree_dir)
            .join(sanitize_branch(&opts.branch));
        let base_branch = if opts.base_branch.is_empty() {
            self.config().workspace.base_branch.clone()
        } else {
            opts.base_branch.clone()
        };

        let session = self.ensure_session()?;
        self.store()
            .set_root_meta(&self.repo_root().display().to_string(), &session)?;

        if self.repo().branch_exists(&opts.branch) {
            self.repo().worktree_add_existing(&worktree_path, &opts.branch)?;
        } else {
            self.repo()
                .worktree_add(&worktree_path, &opts.branch, &base_branch)?;
        }

        let window_name = if opts.name.is_empty() {
            opts.branch.as_str()
        } else {
            opts.name.as_str()
        };

        let window_id = match self.mux().new_window(&session, window_name, &worktree_path) {
            Ok(id) => id,
            Err(e) => {
                let _ = self.repo().worktree_remove(&worktree_path, true);
                return Err(e.into());
            }
        };

        // Everything after this point compensates by killing the window and
        // removing the worktree, in that order.
        let undo = |mgr: &Manager| {
            let _ = mgr.mux().kill_window(&window_id);
            let _ = mgr.repo().worktree_remove(&worktree_path, true);
        };

        if let Err(e) = self.mux().set_remain_on_exit(&window_id, true) {
            undo(self);
            return Err(e.into());
        }

        let primary_pane_id = match self.mux().list_panes(&window_id) {
            Ok(panes) if !panes.is_empty() => panes[0].id.clone(),
            Ok(_) => {
                undo(self);
                return Err(Error::PreconditionFailed(
                    "new window reported no panes".into(),
                ));
            }
            Err(e) => {
                undo(self);
                return Err(e.into());
            }
        };

        let agent_command = build_agent_command(self.config());
        if let Err(e) = self.mux().send_keys(&window_id, &agent_command) {
            undo(self);
            return Err(e.into());
        }

        // Give the shell a moment to exec the agent, then record the pane's
        // PID. This is best-effort: it may still be the shell; the
        // reconciler treats pane death as the authoritative signal.
        std::thread::sleep(PID_SETTLE);
        let agent_pid = match self.mux().list_panes(&window_id) {
            Ok(panes) => panes
                .iter()
                .find(|p| p.id == primary_pane_id)
                .or_else(|| panes.first())
                .map(|p| p.pid)
                .unwrap_or(0),
            Err(e) => {
                undo(self);
                return Err(e.into());
            }
        };

        if !opts.init_command.is_empty() {
            if let Err(e) = self.mux().send_keys(&window_id, &opts.init_command) {
                undo(self);
                return Err(e.into());
            }
        }

        let now = Utc::now();
        let instance = Instance {
            id,
            name: window_name.to_string(),
            branch: opts.branch.clone(),
            base_branch,
            worktree_path: worktree_path.clone(),
            window_id: window_id.clone(),
            primary_pane_id,
            sub_panes: Vec::new(),
            agent_pid,
            status: Status::Running,
            created_at: now,
            last_activity: now,
            pr_url: None,
            conflicts_with: Vec::new(),
            depends_on: Vec::new(),
        };

        match self.store().add_instance(instance) {
            Ok(persisted) => {
                debug!(target: "deck::core", id = %persisted.id, branch = %persisted.branch, "instance created");
                Ok(persisted)
            }
            Err(e) => {
                undo(self);
                Err(e.into())
            }
        }
    }

    /// Delete an instance and release its external resources.
    ///
    /// Idempotent against a half-torn-down world when `force` is set:
    /// killing an absent window or removing an absent worktree soft-fails.
    pub fn delete_instance(&self, id: &str, force: bool, delete_branch: bool) -> Result<()> {
        let instance = self.get_instance(id)?;

        for sub in &instance.sub_panes {
            if let Err(e) = self.mux().kill_pane(&sub.pane_id) {
                warn!(target: "deck::core", pane = %sub.pane_id, error = %e, "failed to kill sub-pane");
            }
        }

        if let Err(e) = self.mux().kill_window(&instance.window_id) {
            if !force {
                return Err(e.into());
            }
            warn!(target: "deck::core", window = %instance.window_id, error = %e, "kill-window failed, continuing");
        }

        if let Err(e) = self.repo().worktree_remove(&instance.worktree_path, force) {
            if !force {
                return Err(e.into());
            }
            warn!(target: "deck::core", path = %instance.worktree_path.display(), error = %e, "worktree remove failed, continuing");
        }

        if delete_branch && instance.branch != instance.base_branch && !instance.branch.is_empty() {
            self.repo().delete_branch(&instance.branch, true)?;
        }

        self.store().remove_instance(id)?;
        debug!(target: "deck::core", id, "instance deleted");
        Ok(())
    }

    /// Stop the agent with SIGSTOP and record the paused state.
    pub fn pause_instance(&self, id: &str) -> Result<()> {
        let instance = self.get_instance(id)?;
        if !process_alive(instance.agent_pid) {
            return Err(Error::NotAlive {
                id: id.to_string(),
                pid: instance.agent_pid,
            });
        }

        kill(Pid::from_raw(instance.agent_pid), Signal::SIGSTOP)
            .map_err(|e| Error::PreconditionFailed(format!("failed to stop agent: {e}")))?;

        self.store()
            .update_instance(id, |inst| inst.status = Status::Paused)?;
        Ok(())
    }

    /// Continue a stopped agent with SIGCONT and record the running state.
    pub fn resume_instance(&self, id: &str) -> Result<()> {
        let instance = self.get_instance(id)?;
        if !process_alive(instance.agent_pid) {
            return Err(Error::NotAlive {
                id: id.to_string(),
                pid: instance.agent_pid,
            });
        }

        kill(Pid::from_raw(instance.agent_pid), Signal::SIGCONT)
            .map_err(|e| Error::PreconditionFailed(format!("failed to continue agent: {e}")))?;

        self.store().update_instance(id, |inst| {
            inst.status = Status::Running;
            inst.last_activity = Utc::now();
        })?;
        Ok(())
    }

    /// Read observed reality for one instance without mutating anything.
    pub fn status_probe(&self, id: &str) -> Result<StatusProbe> {
        let instance = self.get_instance(id)?;

        let pid_alive = process_alive(instance.agent_pid);

        let (window_present, pane_dead) = match self.mux().list_panes(&instance.window_id) {
            Ok(panes) => {
                let dead = panes
                    .iter()
                    .find(|p| p.id == instance.primary_pane_id)
                    .map(|p| p.dead)
                    .unwrap_or(true);
                (true, dead)
            }
            Err(_) => (false, false),
        };

        let is_running = pid_alive && window_present && !pane_dead;
        Ok(StatusProbe {
            can_pause: instance.status == Status::Running && pid_alive,
            can_resume: instance.status == Status::Paused && pid_alive,
            instance,
            pid_alive,
            window_present,
            pane_dead,
            is_running,
        })
    }

    pub fn list_instances(&self) -> Result<Vec<Instance>> {
        Ok(self.store().load()?.instances)
    }

    pub fn get_instance(&self, id: &str) -> Result<Instance> {
        self.store()
            .load()?
            .instance(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Resolve an operator-supplied token against ids first, then names.
    pub fn resolve_instance(&self, id_or_name: &str) -> Result<Instance> {
        let root = self.store().load()?;
        root.instances
            .iter()
            .find(|i| i.id == id_or_name)
            .or_else(|| root.instances.iter().find(|i| i.name == id_or_name))
            .cloned()
            .ok_or_else(|| Error::NotFound(id_or_name.to_string()))
    }

    /// Update the display name. Names are labels, never identity.
    pub fn rename_instance(&self, id: &str, new_name: &str) -> Result<()> {
        if new_name.is_empty() {
            return Err(Error::PreconditionFailed("name cannot be empty".into()));
        }
        self.store()
            .update_instance(id, |inst| inst.name = new_name.to_string())?;
        Ok(())
    }

    /// Diff statistics for the instance's branch against its base.
    pub fn diff_stat(&self, id: &str) -> Result<DiffStat> {
        let instance = self.get_instance(id)?;
        Ok(self.repo().diff_stat(&instance.base_branch, &instance.branch)?)
    }

    /// Changed files with status for the instance's branch against its base.
    pub fn diff_files(&self, id: &str) -> Result<Vec<DiffFile>> {
        let instance = self.get_instance(id)?;
        Ok(self.repo().diff_files(&instance.base_branch, &instance.branch)?)
    }

    /// Select the instance's window and attach, surrendering the terminal
    /// until the tmux client returns.
    pub fn focus_instance(&self, id: &str) -> Result<()> {
        let instance = self.get_instance(id)?;
        let session = self.session_name();
        self.mux().select_window(&instance.window_id)?;
        self.mux().attach_session(&session)?;
        Ok(())
    }

    /// Snapshot of the primary pane: visible contents, or the full
    /// scrollback when `scrollback` is set.
    pub fn capture_output(&self, id: &str, scrollback: bool) -> Result<String> {
        let instance = self.get_instance(id)?;
        let text = if scrollback {
            self.mux().capture_scrollback(&instance.primary_pane_id)?
        } else {
            self.mux().capture_pane(&instance.primary_pane_id)?
        };
        Ok(text)
    }

    /// Refuse to run from inside a worktree: walking up from the current
    /// directory, a `.git` that is a file (not a directory) marks a worktree
    /// child.
    fn check_nested_worktree(&self) -> Result<()> {
        let cwd = std::env::current_dir()?;
        let mut current = cwd.as_path();
        loop {
            let git_path = current.join(".git");
            if let Ok(meta) = std::fs::metadata(&git_path) {
                if !meta.is_dir() {
                    return Err(Error::PreconditionFailed(format!(
                        "cannot create an instance from inside a worktree ({})",
                        cwd.display()
                    )));
                }
                break;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(())
    }
}

/// Map a branch name to a safe directory name: `/` becomes `-`, anything
/// outside `[A-Za-z0-9_.-]` becomes `-`, and leading/trailing `-`/`.` are
/// stripped. An empty result falls back to `branch`.
pub fn sanitize_branch(branch: &str) -> String {
    let sanitized: String = branch
        .chars()
        .map(|c| {
            if c == '/' {
                '-'
            } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let trimmed = sanitized.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        "branch".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The agent launch line: command, extra args, then optional model and
/// provider flags.
pub fn build_agent_command(config: &Config) -> String {
    let agent = &config.agent;
    let mut parts = vec![agent.command.clone()];
    parts.extend(agent.args.iter().cloned());
    if !agent.model.is_empty() {
        parts.push("--model".into());
        parts.push(agent.model.clone());
    }
    if !agent.provider.is_empty() {
        parts.push("--provider".into());
        parts.push(agent.provider.clone());
    }
    parts.join(" ")
}

/// Zero-signal probe: does the process exist? Never blocks.
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    kill(Pid::from_raw(pid), None).is_ok()
}

/// Resolve the worktree path an instance with `branch` would receive.
pub fn worktree_path_for(repo_root: &std::path::Path, config: &Config, branch: &str) -> PathBuf {
    repo_root
        .join(&config.workspace.worktree_dir)
        .join(sanitize_branch(branch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_branch_maps_slashes() {
        assert_eq!(sanitize_branch("feat/x"), "feat-x");
        assert_eq!(sanitize_branch("feature/deep/nest"), "feature-deep-nest");
    }

    #[test]
    fn sanitize_branch_filters_special_chars() {
        assert_eq!(sanitize_branch("fix: the thing"), "fix--the-thing");
        assert_eq!(sanitize_branch("weird~branch^name"), "weird-branch-name");
    }

    #[test]
    fn sanitize_branch_output_is_pathsafe() {
        let out = sanitize_branch("feat/has spaces & symbols!");
        assert!(out
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    }

    #[test]
    fn sanitize_branch_trims_and_falls_back() {
        assert_eq!(sanitize_branch("-lead"), "lead");
        assert_eq!(sanitize_branch(".hidden"), "hidden");
        assert_eq!(sanitize_branch("///"), "branch");
        assert_eq!(sanitize_branch(""), "branch");
    }

    #[test]
    fn agent_command_includes_optional_flags() {
        let mut config = Config::default();
        config.agent.command = "agent".into();
        config.agent.args = vec!["--verbose".into()];
        assert_eq!(build_agent_command(&config), "agent --verbose");

        config.agent.model = "large".into();
        config.agent.provider = "acme".into();
        assert_eq!(
            build_agent_command(&config),
            "agent --verbose --model large --provider acme"
        );
    }

    #[test]
    fn process_probe_rejects_bad_pids() {
        assert!(!process_alive(0));
        assert!(!process_alive(-1));
        // Our own process is certainly alive.
        assert!(process_alive(std::process::id() as i32));
    }
}
