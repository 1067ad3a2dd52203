//! External tool checks: presence and minimum versions.
//!
//! tmux must be at least 2.1 (`remain-on-exit` per window) and git at least
//! 2.15 (reliable worktree handling). The review CLIs are optional; their
//! absence only disables publication.

use std::process::{Command, Stdio};

use regex::Regex;

/// Result of probing one external tool.
#[derive(Debug, Clone)]
pub struct ToolCheck {
    pub name: &'static str,
    pub installed: bool,
    pub version: Option<(u32, u32, u32)>,
    pub problem: Option<String>,
    /// Whether the tool is required for core operation.
    pub required: bool,
}

impl ToolCheck {
    fn missing(name: &'static str, required: bool) -> Self {
        Self {
            name,
            installed: false,
            version: None,
            problem: Some(format!("{name} not found on PATH")),
            required,
        }
    }

    pub fn ok(&self) -> bool {
        self.problem.is_none()
    }
}

/// Probe every tool the system depends on. Exactly one of gh/glab must be
/// present for publication; when both are absent a single optional failure
/// is reported.
pub fn check_all() -> Vec<ToolCheck> {
    let mut results = vec![check_tmux(), check_git()];

    let gh = check_version("gh", false, r"gh version (\d+)\.(\d+)\.(\d+)");
    let glab = check_version("glab", false, r"glab version (\d+)\.(\d+)\.(\d+)");
    if !gh.installed && !glab.installed {
        results.push(ToolCheck {
            name: "gh/glab",
            installed: false,
            version: None,
            problem: Some("neither gh nor glab found; review publication disabled".into()),
            required: false,
        });
    } else {
        if gh.installed {
            results.push(gh);
        }
        if glab.installed {
            results.push(glab);
        }
    }

    results
}

/// Whether any required tool is missing or below its minimum version.
pub fn has_critical_problems(checks: &[ToolCheck]) -> bool {
    checks.iter().any(|c| c.required && !c.ok())
}

pub fn check_tmux() -> ToolCheck {
    let mut check = check_version("tmux", true, r"tmux (?:next-)?(\d+)\.(\d+)");
    if let Some((major, minor, _)) = check.version {
        if major < 2 || (major == 2 && minor < 1) {
            check.problem = Some(format!("tmux {major}.{minor} is too old (minimum 2.1)"));
        }
    }
    check
}

pub fn check_git() -> ToolCheck {
    let mut check = check_version("git", true, r"git version (\d+)\.(\d+)\.(\d+)");
    if let Some((major, minor, _)) = check.version {
        if major < 2 || (major == 2 && minor < 15) {
            check.problem = Some(format!("git {major}.{minor} is too old (minimum 2.15)"));
        }
    }
    check
}

fn check_version(name: &'static str, required: bool, pattern: &str) -> ToolCheck {
    let version_flag = if name == "tmux" { "-V" } else { "--version" };
    let output = match Command::new(name)
        .arg(version_flag)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
    {
        Ok(output) if output.status.success() => output,
        _ => return ToolCheck::missing(name, required),
    };

    let text = String::from_utf8_lossy(&output.stdout);
    let version = parse_version(&text, pattern);
    ToolCheck {
        name,
        installed: true,
        problem: if version.is_none() {
            Some(format!("could not parse {name} version from {:?}", text.trim()))
        } else {
            None
        },
        version,
        required,
    }
}

fn parse_version(text: &str, pattern: &str) -> Option<(u32, u32, u32)> {
    let re = Regex::new(pattern).ok()?;
    let caps = re.captures(text)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    let patch = caps
        .get(3)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Some((major, minor, patch))
}
