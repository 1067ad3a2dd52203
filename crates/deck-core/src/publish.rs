//! Review-request publication: push the branch and open a PR/MR.
//!
//! Publication is gated twice: every dependency must have reached a
//! terminal state, and the pinned merge probe must come back clean.

use std::process::{Command, Stdio};

use tracing::debug;

use deck_state::Status;

use crate::error::{Error, Result};
use crate::manager::Manager;

/// Which review CLI is driving publication. GitHub's is preferred when
/// both are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewTool {
    Github,
    Gitlab,
}

impl ReviewTool {
    pub fn binary(self) -> &'static str {
        match self {
            ReviewTool::Github => "gh",
            ReviewTool::Gitlab => "glab",
        }
    }
}

fn tool_on_path(binary: &str) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Detect which review CLI is present, preferring gh.
pub fn detect_review_tool() -> Result<ReviewTool> {
    if tool_on_path("gh") {
        return Ok(ReviewTool::Github);
    }
    if tool_on_path("glab") {
        return Ok(ReviewTool::Gitlab);
    }
    Err(Error::ToolMissing("gh or glab"))
}

impl Manager {
    /// Push the instance's branch to origin.
    pub fn push_branch(&self, id: &str) -> Result<()> {
        let instance = self.get_instance(id)?;
        self.repo().push("origin", &instance.branch)?;
        Ok(())
    }

    /// Push the branch and publish a review request. Refuses while any
    /// dependency is unmerged or the merge probe reports conflicts. On
    /// success the instance records the URL and moves to `merged`.
    pub fn push_and_publish(&self, id: &str, title: &str, body: &str) -> Result<String> {
        let instance = self.get_instance(id)?;

        let unmerged = self.check_dependencies_merged(id)?;
        if !unmerged.is_empty() {
            return Err(Error::DependencyBlocksMerge {
                id: id.to_string(),
                unmerged,
            });
        }

        let (has_conflicts, files) = self.probe_merge(id)?;
        if has_conflicts {
            return Err(Error::MergeHasConflicts { files });
        }

        let tool = detect_review_tool()?;
        self.repo().push("origin", &instance.branch)?;

        let title = if title.is_empty() {
            title_from_branch(&instance.branch)
        } else {
            title.to_string()
        };
        let body = if body.is_empty() {
            self.config().review.template.clone()
        } else {
            body.to_string()
        };

        let url = self.run_review_tool(tool, &instance.base_branch, &title, &body)?;

        self.store().update_instance(id, |inst| {
            inst.pr_url = Some(url.clone());
            inst.status = Status::Merged;
        })?;

        Ok(url)
    }

    fn run_review_tool(
        &self,
        tool: ReviewTool,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let mut args: Vec<&str> = match tool {
            ReviewTool::Github => vec!["pr", "create", "--title", title, "--base", base],
            ReviewTool::Gitlab => vec!["mr", "create", "--title", title, "--target-branch", base],
        };
        if !body.is_empty() {
            args.push(match tool {
                ReviewTool::Github => "--body",
                ReviewTool::Gitlab => "--description",
            });
            args.push(body);
        }
        if self.config().review.draft {
            args.push("--draft");
        }

        debug!(target: "deck::core", tool = tool.binary(), ?args, "publishing review request");
        let output = Command::new(tool.binary())
            .args(&args)
            .current_dir(self.repo_root())
            .stdin(Stdio::null())
            .output()?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(Error::ReviewToolFailed {
                tool: tool.binary(),
                message: combined.trim().to_string(),
            });
        }

        extract_url(&combined).ok_or_else(|| Error::ReviewToolFailed {
            tool: tool.binary(),
            message: format!("no URL in output: {}", combined.trim()),
        })
    }
}

/// The URL is the last `http`-prefixed line of the combined output.
fn extract_url(output: &str) -> Option<String> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with("http"))
        .map(String::from)
}

/// Derive a readable title from a branch name: strip the common prefixes,
/// turn separators into spaces, capitalise the first letter.
pub fn title_from_branch(branch: &str) -> String {
    let mut name = branch;
    for prefix in ["feature/", "feat/", "bugfix/", "fix/", "hotfix/"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            if !rest.is_empty() {
                name = rest;
            }
            break;
        }
    }

    let spaced = name.replace(['-', '_'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_last_http_line() {
        let output = "Creating pull request\nhttps://example.com/old\nDone\nhttps://github.com/o/r/pull/7\n";
        assert_eq!(
            extract_url(output).unwrap(),
            "https://github.com/o/r/pull/7"
        );
    }

    #[test]
    fn no_url_yields_none() {
        assert!(extract_url("nothing to see\nhere").is_none());
        assert!(extract_url("").is_none());
    }

    #[test]
    fn titles_from_branches() {
        assert_eq!(title_from_branch("feat/add-login"), "Add login");
        assert_eq!(title_from_branch("fix/crash_on_boot"), "Crash on boot");
        assert_eq!(title_from_branch("plain-branch"), "Plain branch");
        assert_eq!(title_from_branch("feature/"), "Feature/");
    }
}
