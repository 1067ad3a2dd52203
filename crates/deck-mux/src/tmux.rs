//! The tmux adapter.
//!
//! All verbs are stateless: each one spawns `tmux`, captures stdout and
//! stderr separately, and either parses the output or maps a non-zero exit
//! into [`MuxError::CommandFailed`]. The single exception is
//! [`TmuxAdapter::attach_session`], which hands the controlling terminal to
//! the child and blocks until the client detaches.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::{MuxError, MuxResult, PaneId, PaneInfo, SplitDirection, WindowId, WindowInfo};

/// Format string for `list-panes`; fields are `:`-separated and split with a
/// bounded `splitn` so a command name containing `:` stays intact.
const PANE_FORMAT: &str = "#{pane_id}:#{pane_pid}:#{pane_dead}:#{pane_current_command}";

const WINDOW_FORMAT: &str = "#{window_id}:#{window_name}:#{window_active}";

/// Stateless tmux command runner.
#[derive(Debug, Default, Clone)]
pub struct TmuxAdapter;

impl TmuxAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Check whether tmux can be executed on this system.
    pub fn is_installed(&self) -> bool {
        Command::new("tmux")
            .arg("-V")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// The installed tmux version string, e.g. `tmux 3.3a`.
    pub fn version(&self) -> MuxResult<String> {
        self.run(&["-V"])
    }

    fn run(&self, args: &[&str]) -> MuxResult<String> {
        debug!(target: "deck::mux", ?args, "tmux");
        let output = Command::new("tmux")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MuxError::NotAvailable
                } else {
                    MuxError::Io(e)
                }
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(MuxError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Run tmux with the controlling terminal inherited. Blocks until the
    /// child exits; used only for attach.
    fn run_attached(&self, args: &[&str]) -> MuxResult<()> {
        debug!(target: "deck::mux", ?args, "tmux (attached)");
        let status = Command::new("tmux")
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MuxError::NotAvailable
                } else {
                    MuxError::Io(e)
                }
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(MuxError::CommandFailed {
                command: args.join(" "),
                stderr: format!("exit status {}", status.code().unwrap_or(-1)),
            })
        }
    }

    // --- sessions ---

    /// Create a new detached session rooted at `dir`.
    pub fn new_session(&self, name: &str, dir: &Path) -> MuxResult<()> {
        let dir = dir.to_string_lossy();
        self.run(&["new-session", "-d", "-s", name, "-c", &dir])?;
        Ok(())
    }

    pub fn has_session(&self, name: &str) -> bool {
        self.run(&["has-session", "-t", name]).is_ok()
    }

    pub fn kill_session(&self, name: &str) -> MuxResult<()> {
        self.run(&["kill-session", "-t", name])?;
        Ok(())
    }

    /// Names of all live sessions. A missing server counts as zero sessions,
    /// not an error.
    pub fn list_sessions(&self) -> MuxResult<Vec<String>> {
        match self.run(&["list-sessions", "-F", "#{session_name}"]) {
            Ok(output) => Ok(output
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()),
            Err(MuxError::CommandFailed { stderr, .. })
                if stderr.contains("no server running") || stderr.contains("error connecting") =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Attach to a session, taking over the terminal until the user detaches.
    pub fn attach_session(&self, name: &str) -> MuxResult<()> {
        self.run_attached(&["attach-session", "-t", name])
    }

    // --- windows ---

    /// Create a window in `session` with `dir` as its working directory.
    /// `-P -F '#{window_id}'` makes tmux print the new handle, so no
    /// follow-up list query is needed.
    pub fn new_window(&self, session: &str, name: &str, dir: &Path) -> MuxResult<WindowId> {
        let dir = dir.to_string_lossy();
        let output = self.run(&[
            "new-window",
            "-t",
            session,
            "-n",
            name,
            "-c",
            &dir,
            "-P",
            "-F",
            "#{window_id}",
        ])?;
        let id = output.trim();
        if id.is_empty() {
            return Err(MuxError::BadOutput("new-window returned no id".into()));
        }
        Ok(id.to_string())
    }

    pub fn kill_window(&self, target: &WindowId) -> MuxResult<()> {
        self.run(&["kill-window", "-t", target])?;
        Ok(())
    }

    pub fn list_windows(&self, session: &str) -> MuxResult<Vec<WindowInfo>> {
        let output = self.run(&["list-windows", "-t", session, "-F", WINDOW_FORMAT])?;
        Ok(parse_window_list(&output))
    }

    pub fn select_window(&self, target: &WindowId) -> MuxResult<()> {
        self.run(&["select-window", "-t", target])?;
        Ok(())
    }

    /// Send `keys` to a window or pane, terminated by Enter.
    pub fn send_keys(&self, target: &str, keys: &str) -> MuxResult<()> {
        self.run(&["send-keys", "-t", target, keys, "Enter"])?;
        Ok(())
    }

    // --- panes ---

    /// Split `target`, returning the new pane's handle. `percent` sizes the
    /// new pane; `dir` becomes its working directory.
    pub fn split_window(
        &self,
        target: &str,
        dir: &Path,
        direction: SplitDirection,
        percent: u8,
    ) -> MuxResult<PaneId> {
        let dir = dir.to_string_lossy();
        let pct = percent.to_string();
        let mut args = vec!["split-window", "-t", target, "-P", "-F", "#{pane_id}"];
        args.push(direction.flag());
        if percent > 0 && percent <= 100 {
            args.push("-p");
            args.push(&pct);
        }
        args.push("-c");
        args.push(&dir);

        let output = self.run(&args)?;
        let id = output.trim();
        if id.is_empty() {
            return Err(MuxError::BadOutput("split-window returned no id".into()));
        }
        Ok(id.to_string())
    }

    pub fn kill_pane(&self, target: &PaneId) -> MuxResult<()> {
        self.run(&["kill-pane", "-t", target])?;
        Ok(())
    }

    pub fn list_panes(&self, window: &WindowId) -> MuxResult<Vec<PaneInfo>> {
        let output = self.run(&["list-panes", "-t", window, "-F", PANE_FORMAT])?;
        Ok(parse_pane_list(&output))
    }

    /// Visible contents of a pane, escape sequences preserved.
    pub fn capture_pane(&self, target: &PaneId) -> MuxResult<String> {
        self.run(&["capture-pane", "-p", "-e", "-J", "-t", target])
    }

    /// Full scrollback history of a pane.
    pub fn capture_scrollback(&self, target: &PaneId) -> MuxResult<String> {
        self.run(&["capture-pane", "-p", "-S", "-", "-E", "-", "-t", target])
    }

    // --- options ---

    pub fn set_option(&self, target: &str, option: &str, value: &str) -> MuxResult<()> {
        self.run(&["set-option", "-t", target, option, value])?;
        Ok(())
    }

    /// Keep a window's panes around after their process exits, so agent
    /// termination is later observable as `pane_dead`.
    pub fn set_remain_on_exit(&self, window: &WindowId, on: bool) -> MuxResult<()> {
        self.set_option(window, "remain-on-exit", if on { "on" } else { "off" })
    }
}

fn parse_window_list(output: &str) -> Vec<WindowInfo> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let mut parts = line.splitn(3, ':');
            let id = parts.next()?.to_string();
            let name = parts.next()?.to_string();
            let active = parts.next()? == "1";
            Some(WindowInfo { id, name, active })
        })
        .collect()
}

fn parse_pane_list(output: &str) -> Vec<PaneInfo> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let mut parts = line.splitn(4, ':');
            let id = parts.next()?.to_string();
            let pid = parts.next()?.parse().unwrap_or(0);
            let dead = parts.next()? == "1";
            let command = parts.next()?.to_string();
            Some(PaneInfo {
                id,
                pid,
                dead,
                command,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parse_pane_list_basic() {
        let output = "%0:1234:0:zsh\n%1:5678:1:node\n";
        let panes = parse_pane_list(output);
        assert_eq!(panes.len(), 2);
        assert_eq!(panes[0].id, "%0");
        assert_eq!(panes[0].pid, 1234);
        assert!(!panes[0].dead);
        assert_eq!(panes[0].command, "zsh");
        assert!(panes[1].dead);
    }

    #[test]
    fn parse_pane_list_command_with_colon() {
        // The bounded split keeps a `:` inside the command field intact.
        let panes = parse_pane_list("%2:42:0:watch -n1 date: now\n");
        assert_eq!(panes.len(), 1);
        assert_eq!(panes[0].command, "watch -n1 date: now");
    }

    #[test]
    fn parse_pane_list_skips_malformed_lines() {
        let panes = parse_pane_list("%0:1:0:sh\ngarbage\n\n%1:2:0:sh\n");
        assert_eq!(panes.len(), 2);
    }

    #[test]
    fn parse_window_list_basic() {
        let windows = parse_window_list("@1:feat-x:1\n@2:feat-y:0\n");
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].id, "@1");
        assert_eq!(windows[0].name, "feat-x");
        assert!(windows[0].active);
        assert!(!windows[1].active);
    }

    #[test]
    fn session_roundtrip() {
        let tmux = TmuxAdapter::new();
        if !tmux.is_installed() {
            eprintln!("skipping: tmux not available");
            return;
        }

        let name = format!("deck-test-{}", std::process::id());
        let _ = tmux.kill_session(&name);

        assert!(!tmux.has_session(&name));
        tmux.new_session(&name, Path::new("/tmp")).unwrap();
        assert!(tmux.has_session(&name));
        assert!(tmux.list_sessions().unwrap().contains(&name));

        tmux.kill_session(&name).unwrap();
        assert!(!tmux.has_session(&name));
    }

    #[test]
    fn window_and_pane_lifecycle() {
        let tmux = TmuxAdapter::new();
        if !tmux.is_installed() {
            eprintln!("skipping: tmux not available");
            return;
        }

        let name = format!("deck-test-win-{}", std::process::id());
        let _ = tmux.kill_session(&name);
        tmux.new_session(&name, Path::new("/tmp")).unwrap();

        let window = tmux.new_window(&name, "work", Path::new("/tmp")).unwrap();
        assert!(window.starts_with('@'));
        tmux.set_remain_on_exit(&window, true).unwrap();

        let panes = tmux.list_panes(&window).unwrap();
        assert_eq!(panes.len(), 1);
        assert!(panes[0].pid > 0);

        let pane = tmux
            .split_window(&window, Path::new("/tmp"), SplitDirection::Vertical, 30)
            .unwrap();
        assert!(pane.starts_with('%'));
        assert_eq!(tmux.list_panes(&window).unwrap().len(), 2);

        tmux.kill_pane(&pane).unwrap();
        assert_eq!(tmux.list_panes(&window).unwrap().len(), 1);

        tmux.kill_window(&window).unwrap();
        let _ = tmux.kill_session(&name);
    }
}
