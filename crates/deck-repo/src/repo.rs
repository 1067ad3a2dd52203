//! Repository handle and branch-level verbs.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{VcsError, VcsResult};

/// A handle on one git repository. All commands run with `-C <root>`.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run a git subcommand, returning trimmed stdout.
    pub(crate) fn run(&self, args: &[&str]) -> VcsResult<String> {
        debug!(target: "deck::repo", ?args, "git");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()?;

        if output.status.success() {
            let stdout = String::from_utf8(output.stdout)?;
            Ok(stdout.trim_end().to_string())
        } else {
            Err(VcsError::CommandFailed {
                command: args.join(" "),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Run a git subcommand capturing stdout and stderr together, along with
    /// the exit status. The merge probe needs the combined stream because
    /// `merge-tree` reports conflicts on stdout with a non-zero exit.
    pub(crate) fn run_combined(&self, args: &[&str]) -> VcsResult<(bool, String)> {
        debug!(target: "deck::repo", ?args, "git (combined)");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok((output.status.success(), combined.trim().to_string()))
    }

    /// Whether `root` is inside a git repository at all.
    pub fn is_git_repo(&self) -> bool {
        self.run(&["rev-parse", "--git-dir"]).is_ok()
    }

    pub fn current_branch(&self) -> VcsResult<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn head_sha(&self) -> VcsResult<String> {
        self.run(&["rev-parse", "HEAD"])
    }

    pub fn branch_exists(&self, branch: &str) -> bool {
        let ref_name = format!("refs/heads/{branch}");
        self.run(&["show-ref", "--verify", &ref_name]).is_ok()
    }

    /// Detect the default branch: the remote HEAD if configured, otherwise
    /// a local `main`, otherwise `master`.
    pub fn default_branch(&self) -> VcsResult<String> {
        if let Ok(output) = self.run(&["symbolic-ref", "refs/remotes/origin/HEAD"]) {
            if let Some(name) = output.rsplit('/').next() {
                if !name.is_empty() {
                    return Ok(name.to_string());
                }
            }
        }

        for candidate in ["main", "master"] {
            if self.branch_exists(candidate) {
                return Ok(candidate.to_string());
            }
        }

        Err(VcsError::NoDefaultBranch)
    }

    pub fn remotes(&self) -> VcsResult<Vec<String>> {
        let output = self.run(&["remote"])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    pub fn push(&self, remote: &str, branch: &str) -> VcsResult<()> {
        self.run(&["push", remote, branch])?;
        Ok(())
    }

    pub fn delete_branch(&self, branch: &str, force: bool) -> VcsResult<()> {
        let flag = if force { "-D" } else { "-d" };
        self.run(&["branch", flag, branch])?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    pub fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Scratch repository with an initial commit on `main`.
    pub fn scratch_repo() -> (TempDir, GitRepo) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let steps: &[&[&str]] = &[
            &["init", "-b", "main"],
            &["config", "user.email", "test@example.com"],
            &["config", "user.name", "Test User"],
            &["config", "commit.gpgsign", "false"],
        ];
        for args in steps {
            let status = Command::new("git")
                .args(*args)
                .current_dir(&path)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .unwrap();
            assert!(status.success(), "git {args:?} failed");
        }

        std::fs::write(path.join("README.md"), "initial\n").unwrap();
        for args in [
            vec!["add", "README.md"],
            vec!["commit", "-m", "initial commit"],
        ] {
            let status = Command::new("git")
                .args(&args)
                .current_dir(&path)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .unwrap();
            assert!(status.success(), "git {args:?} failed");
        }

        let repo = GitRepo::new(&path);
        (dir, repo)
    }

    /// Commit `content` to `filename` on the current branch.
    pub fn commit_file(repo: &GitRepo, filename: &str, content: &str, message: &str) {
        std::fs::write(repo.root().join(filename), content).unwrap();
        repo.run(&["add", filename]).unwrap();
        repo.run(&["commit", "-m", message]).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;

    #[test]
    fn detects_repo_and_branches() {
        if !git_available() {
            eprintln!("skipping: git not available");
            return;
        }
        let (_dir, repo) = scratch_repo();

        assert!(repo.is_git_repo());
        assert_eq!(repo.current_branch().unwrap(), "main");
        assert!(repo.branch_exists("main"));
        assert!(!repo.branch_exists("nope"));
        assert_eq!(repo.default_branch().unwrap(), "main");
        assert_eq!(repo.head_sha().unwrap().len(), 40);
    }

    #[test]
    fn branch_delete() {
        if !git_available() {
            eprintln!("skipping: git not available");
            return;
        }
        let (_dir, repo) = scratch_repo();

        repo.run(&["branch", "scratch"]).unwrap();
        assert!(repo.branch_exists("scratch"));
        repo.delete_branch("scratch", true).unwrap();
        assert!(!repo.branch_exists("scratch"));
    }
}
