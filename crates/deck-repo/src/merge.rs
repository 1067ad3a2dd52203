//! Merge-base resolution and the dry-run merge probe.

use crate::error::{VcsError, VcsResult};
use crate::repo::GitRepo;

/// Outcome of a three-way merge probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub clean: bool,
    pub conflict_files: Vec<String>,
}

impl GitRepo {
    /// The merge base commit of two branches.
    pub fn merge_base(&self, branch1: &str, branch2: &str) -> VcsResult<String> {
        self.run(&["merge-base", branch1, branch2])
    }

    /// Probe a three-way merge of `branch1` and `branch2` with the merge
    /// base pinned explicitly. Pinning is mandatory: without `--merge-base`
    /// the probe is nondeterministic when the branches have multiple bases.
    pub fn merge_tree(&self, base: &str, branch1: &str, branch2: &str) -> VcsResult<MergeResult> {
        let base_flag = format!("--merge-base={base}");
        let (success, output) =
            self.run_combined(&["merge-tree", "--write-tree", &base_flag, branch1, branch2])?;

        if success {
            return Ok(MergeResult {
                clean: true,
                conflict_files: Vec::new(),
            });
        }

        let (conflict_files, informational) = parse_merge_tree_conflicts(&output);
        if !conflict_files.is_empty() || informational {
            return Ok(MergeResult {
                clean: false,
                conflict_files,
            });
        }

        Err(VcsError::CommandFailed {
            command: "merge-tree --write-tree".to_string(),
            exit_code: 1,
            stderr: output,
        })
    }

    /// The authoritative merge gate: resolve the merge base, then probe.
    /// Returns `(has_conflicts, conflict_files)`.
    pub fn has_conflicts(&self, branch: &str, base_branch: &str) -> VcsResult<(bool, Vec<String>)> {
        let base = self.merge_base(branch, base_branch)?;
        let result = self.merge_tree(&base, branch, base_branch)?;
        Ok((!result.clean, result.conflict_files))
    }
}

/// Extract conflict paths from merge-tree output. Returns the paths plus a
/// flag saying whether merge-style informational lines were seen at all,
/// which distinguishes "conflicted but unparseable" from a hard failure.
fn parse_merge_tree_conflicts(output: &str) -> (Vec<String>, bool) {
    let mut files = Vec::new();
    let mut informational = false;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("CONFLICT") {
            informational = true;
            if let Some((_, path)) = line.split_once("Merge conflict in ") {
                let path = path.trim();
                if !path.is_empty() {
                    files.push(path.to_string());
                }
            }
        } else if line.starts_with("Auto-merging ") {
            informational = true;
        }
    }

    (files, informational)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::*;

    #[test]
    fn parse_conflict_lines() {
        let output = "\
deadbeefdeadbeefdeadbeefdeadbeefdeadbeef
Auto-merging src/lib.rs
CONFLICT (content): Merge conflict in src/lib.rs
CONFLICT (content): Merge conflict in src/other.rs";
        let (files, info) = parse_merge_tree_conflicts(output);
        assert!(info);
        assert_eq!(files, vec!["src/lib.rs", "src/other.rs"]);
    }

    #[test]
    fn parse_no_conflict_markers() {
        let (files, info) = parse_merge_tree_conflicts("fatal: bad revision 'x'");
        assert!(files.is_empty());
        assert!(!info);
    }

    #[test]
    fn probe_clean_and_conflicting() {
        if !git_available() {
            eprintln!("skipping: git not available");
            return;
        }
        let (_dir, repo) = scratch_repo();

        // Two branches touching different files merge cleanly.
        repo.run(&["checkout", "-b", "left"]).unwrap();
        commit_file(&repo, "left.txt", "left\n", "left change");
        repo.run(&["checkout", "main"]).unwrap();
        repo.run(&["checkout", "-b", "right"]).unwrap();
        commit_file(&repo, "right.txt", "right\n", "right change");
        repo.run(&["checkout", "main"]).unwrap();

        let (conflicts, files) = repo.has_conflicts("left", "right").unwrap();
        assert!(!conflicts);
        assert!(files.is_empty());

        // Two branches editing the same line conflict.
        repo.run(&["checkout", "-b", "alpha"]).unwrap();
        commit_file(&repo, "shared.txt", "alpha\n", "alpha edit");
        repo.run(&["checkout", "main"]).unwrap();
        repo.run(&["checkout", "-b", "beta"]).unwrap();
        commit_file(&repo, "shared.txt", "beta\n", "beta edit");
        repo.run(&["checkout", "main"]).unwrap();

        let (conflicts, files) = repo.has_conflicts("alpha", "beta").unwrap();
        assert!(conflicts);
        assert!(files.contains(&"shared.txt".to_string()));
    }
}
