//! Worktree verbs and the porcelain list parser.

use std::path::{Path, PathBuf};

use crate::error::VcsResult;
use crate::repo::GitRepo;

/// One record from `git worktree list --porcelain`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
    pub bare: bool,
    pub detached: bool,
}

impl GitRepo {
    /// Create a worktree at `path` on a new branch rooted at `base`.
    pub fn worktree_add(&self, path: &Path, branch: &str, base: &str) -> VcsResult<()> {
        let path = path.to_string_lossy();
        self.run(&["worktree", "add", &path, "-b", branch, base])?;
        Ok(())
    }

    /// Create a worktree at `path` attaching an existing branch.
    pub fn worktree_add_existing(&self, path: &Path, branch: &str) -> VcsResult<()> {
        let path = path.to_string_lossy();
        self.run(&["worktree", "add", &path, branch])?;
        Ok(())
    }

    pub fn worktree_remove(&self, path: &Path, force: bool) -> VcsResult<()> {
        let path = path.to_string_lossy();
        if force {
            self.run(&["worktree", "remove", "-f", &path])?;
        } else {
            self.run(&["worktree", "remove", &path])?;
        }
        Ok(())
    }

    pub fn worktree_list(&self) -> VcsResult<Vec<WorktreeInfo>> {
        let output = self.run(&["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_porcelain(&output))
    }

    /// Repair worktree administrative files after moves or manual damage.
    pub fn worktree_repair(&self) -> VcsResult<()> {
        self.run(&["worktree", "repair"])?;
        Ok(())
    }

    /// Drop bookkeeping for worktrees whose directories are gone.
    pub fn worktree_prune(&self) -> VcsResult<()> {
        self.run(&["worktree", "prune"])?;
        Ok(())
    }
}

/// Parse the porcelain form: records are blank-line delimited, each line a
/// `key value` pair or a bare flag (`bare`, `detached`). A trailing record
/// with no final blank line is kept.
fn parse_worktree_porcelain(output: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    let mut current = WorktreeInfo::default();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.path.as_os_str().is_empty() {
                worktrees.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(path) = line.strip_prefix("worktree ") {
            current.path = PathBuf::from(path);
        } else if let Some(head) = line.strip_prefix("HEAD ") {
            current.head = head.to_string();
        } else if let Some(branch_ref) = line.strip_prefix("branch ") {
            let name = branch_ref.strip_prefix("refs/heads/").unwrap_or(branch_ref);
            current.branch = Some(name.to_string());
        } else if line == "bare" {
            current.bare = true;
        } else if line == "detached" {
            current.detached = true;
        }
    }

    if !current.path.as_os_str().is_empty() {
        worktrees.push(current);
    }

    worktrees
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::*;

    #[test]
    fn parse_porcelain_records() {
        let output = "\
worktree /repo
HEAD 1111111111111111111111111111111111111111
branch refs/heads/main

worktree /repo/.worktrees/feat-x
HEAD 2222222222222222222222222222222222222222
branch refs/heads/feat/x

worktree /repo/.worktrees/probe
HEAD 3333333333333333333333333333333333333333
detached
";
        let wts = parse_worktree_porcelain(output);
        assert_eq!(wts.len(), 3);
        assert_eq!(wts[0].path, PathBuf::from("/repo"));
        assert_eq!(wts[0].branch.as_deref(), Some("main"));
        assert_eq!(wts[1].branch.as_deref(), Some("feat/x"));
        assert!(wts[2].detached);
        assert!(wts[2].branch.is_none());
    }

    #[test]
    fn parse_porcelain_trailing_record_without_blank() {
        let output = "worktree /only\nHEAD 4444444444444444444444444444444444444444\nbare";
        let wts = parse_worktree_porcelain(output);
        assert_eq!(wts.len(), 1);
        assert!(wts[0].bare);
    }

    #[test]
    fn parse_porcelain_empty() {
        assert!(parse_worktree_porcelain("").is_empty());
    }

    #[test]
    fn worktree_add_list_remove() {
        if !git_available() {
            eprintln!("skipping: git not available");
            return;
        }
        let (_dir, repo) = scratch_repo();

        let wt_path = repo.root().join(".worktrees").join("feat-x");
        repo.worktree_add(&wt_path, "feat/x", "main").unwrap();
        assert!(wt_path.exists());
        assert!(repo.branch_exists("feat/x"));

        let listed = repo.worktree_list().unwrap();
        assert!(listed
            .iter()
            .any(|wt| wt.branch.as_deref() == Some("feat/x")));

        repo.worktree_remove(&wt_path, true).unwrap();
        assert!(!wt_path.exists());

        // Attach the surviving branch to a fresh worktree.
        let wt_path2 = repo.root().join(".worktrees").join("feat-x-again");
        repo.worktree_add_existing(&wt_path2, "feat/x").unwrap();
        assert!(wt_path2.exists());
        repo.worktree_remove(&wt_path2, true).unwrap();
    }

    #[test]
    fn repair_and_prune_are_safe_on_clean_repo() {
        if !git_available() {
            eprintln!("skipping: git not available");
            return;
        }
        let (_dir, repo) = scratch_repo();
        repo.worktree_repair().unwrap();
        repo.worktree_prune().unwrap();
    }
}
