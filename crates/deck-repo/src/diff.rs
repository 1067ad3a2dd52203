//! Diff inspection: stat summaries and changed-file listings.

use regex::Regex;

use crate::error::VcsResult;
use crate::repo::GitRepo;

/// Totals parsed from the summary line of `git diff --stat`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffStat {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
    pub summary: String,
}

/// One entry of `git diff --name-status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFile {
    /// Single-letter status: M, A, D, R…
    pub status: String,
    pub path: String,
}

impl GitRepo {
    /// Diff statistics for `base..branch`.
    pub fn diff_stat(&self, base: &str, branch: &str) -> VcsResult<DiffStat> {
        let range = format!("{base}..{branch}");
        let output = self.run(&["diff", "--stat", &range])?;
        Ok(parse_diff_stat(&output))
    }

    /// Changed files with status for `base..branch`.
    pub fn diff_files(&self, base: &str, branch: &str) -> VcsResult<Vec<DiffFile>> {
        let range = format!("{base}..{branch}");
        let output = self.run(&["diff", "--name-status", &range])?;
        Ok(parse_diff_files(&output))
    }

    /// Paths changed on `branch` relative to `base`, without status.
    pub fn diff_name_only(&self, base: &str, branch: &str) -> VcsResult<Vec<String>> {
        let range = format!("{base}..{branch}");
        let output = self.run(&["diff", "--name-only", &range])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

fn parse_diff_stat(output: &str) -> DiffStat {
    let mut stat = DiffStat::default();
    if output.is_empty() {
        return stat;
    }

    let summary = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    stat.summary = summary.to_string();

    let files_re = Regex::new(r"(\d+) files? changed").unwrap();
    let ins_re = Regex::new(r"(\d+) insertions?\(\+\)").unwrap();
    let del_re = Regex::new(r"(\d+) deletions?\(-\)").unwrap();

    if let Some(c) = files_re.captures(summary) {
        stat.files_changed = c[1].parse().unwrap_or(0);
    }
    if let Some(c) = ins_re.captures(summary) {
        stat.insertions = c[1].parse().unwrap_or(0);
    }
    if let Some(c) = del_re.captures(summary) {
        stat.deletions = c[1].parse().unwrap_or(0);
    }

    stat
}

fn parse_diff_files(output: &str) -> Vec<DiffFile> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let mut parts = line.split_whitespace();
            let status = parts.next()?.to_string();
            let rest: Vec<&str> = parts.collect();
            if rest.is_empty() {
                return None;
            }
            Some(DiffFile {
                status,
                path: rest.join(" "),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::*;

    #[test]
    fn parse_stat_summary() {
        let output = "\
 src/lib.rs | 10 ++++++++++
 src/foo.rs |  5 -----
 2 files changed, 10 insertions(+), 5 deletions(-)";
        let stat = parse_diff_stat(output);
        assert_eq!(stat.files_changed, 2);
        assert_eq!(stat.insertions, 10);
        assert_eq!(stat.deletions, 5);
        assert!(stat.summary.starts_with("2 files changed"));
    }

    #[test]
    fn parse_stat_singular_forms() {
        let stat = parse_diff_stat(" a | 1 +\n 1 file changed, 1 insertion(+)");
        assert_eq!(stat.files_changed, 1);
        assert_eq!(stat.insertions, 1);
        assert_eq!(stat.deletions, 0);
    }

    #[test]
    fn parse_stat_empty() {
        assert_eq!(parse_diff_stat(""), DiffStat::default());
    }

    #[test]
    fn parse_name_status() {
        let files = parse_diff_files("M\tsrc/lib.rs\nA\tdocs/new file.md\nD\told.rs\n");
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].status, "M");
        assert_eq!(files[0].path, "src/lib.rs");
        assert_eq!(files[1].path, "docs/new file.md");
    }

    #[test]
    fn diff_between_branches() {
        if !git_available() {
            eprintln!("skipping: git not available");
            return;
        }
        let (_dir, repo) = scratch_repo();

        repo.run(&["checkout", "-b", "feat"]).unwrap();
        commit_file(&repo, "feature.txt", "hello\n", "add feature");
        repo.run(&["checkout", "main"]).unwrap();

        let stat = repo.diff_stat("main", "feat").unwrap();
        assert_eq!(stat.files_changed, 1);
        assert_eq!(stat.insertions, 1);

        let files = repo.diff_name_only("main", "feat").unwrap();
        assert_eq!(files, vec!["feature.txt".to_string()]);
    }
}
