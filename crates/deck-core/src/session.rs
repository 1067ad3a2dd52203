//! The one tmux session per repository.
//!
//! The session controller holds no state: its identity derives from the
//! repository path and the configured prefix, so every invocation of the
//! binary lands on the same session.

use crate::error::{Error, Result};
use crate::manager::Manager;

impl Manager {
    /// The deterministic session name: `<prefix>-<sanitised repo basename>`.
    pub fn session_name(&self) -> String {
        let basename = self
            .repo_root()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "{}-{}",
            self.config().multiplexer.session_prefix,
            sanitize_session_component(&basename)
        )
    }

    /// Create the session if absent. Idempotent: returns the name whether it
    /// was created or already present.
    pub fn ensure_session(&self) -> Result<String> {
        let name = self.session_name();
        if !self.mux().has_session(&name) {
            self.mux().new_session(&name, self.repo_root())?;
        }
        Ok(name)
    }

    pub fn session_exists(&self) -> bool {
        self.mux().has_session(&self.session_name())
    }

    pub fn kill_session(&self) -> Result<()> {
        let name = self.session_name();
        if !self.mux().has_session(&name) {
            return Err(Error::NotFound(format!("session {name}")));
        }
        self.mux().kill_session(&name)?;
        Ok(())
    }

    /// Tear down everything: force-delete every instance, then the session.
    pub fn kill_all(&self) -> Result<()> {
        let root = self.store().load()?;
        for instance in &root.instances {
            self.delete_instance(&instance.id, true, false)?;
        }
        if self.session_exists() {
            self.kill_session()?;
        }
        Ok(())
    }
}

/// Collapse any non-alphanumeric run to a single hyphen and trim the ends.
/// An empty result falls back to `repo`.
pub fn sanitize_session_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            out.push('-');
            last_was_hyphen = true;
        }
    }

    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "repo".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_plain_name() {
        assert_eq!(sanitize_session_component("myproject"), "myproject");
    }

    #[test]
    fn sanitize_collapses_special_runs() {
        assert_eq!(sanitize_session_component("my..//project"), "my-project");
        assert_eq!(sanitize_session_component("a b c"), "a-b-c");
    }

    #[test]
    fn sanitize_trims_edges() {
        assert_eq!(sanitize_session_component(".hidden-repo."), "hidden-repo");
    }

    #[test]
    fn sanitize_empty_falls_back() {
        assert_eq!(sanitize_session_component(""), "repo");
        assert_eq!(sanitize_session_component("..."), "repo");
    }
}
