//! The manager owns one repository's adapters, store, and configuration.

use std::path::{Path, PathBuf};

use deck_config::Config;
use deck_mux::TmuxAdapter;
use deck_repo::GitRepo;
use deck_state::Store;

use crate::error::{Error, Result};

/// Orchestrates git worktrees, tmux windows, and state persistence for one
/// repository. All operator verbs hang off this type.
#[derive(Debug)]
pub struct Manager {
    repo: GitRepo,
    mux: TmuxAdapter,
    store: Store,
    config: Config,
    repo_root: PathBuf,
}

impl Manager {
    /// Build a manager for the repository at `repo_root`. Fails when the
    /// path is not a git repository or tmux is unavailable.
    pub fn new<P: AsRef<Path>>(repo_root: P, config: Config) -> Result<Self> {
        let repo_root = repo_root.as_ref().to_path_buf();
        if repo_root.as_os_str().is_empty() {
            return Err(Error::PreconditionFailed(
                "repository root cannot be empty".into(),
            ));
        }

        let repo = GitRepo::new(&repo_root);
        if !repo.is_git_repo() {
            return Err(Error::PreconditionFailed(format!(
                "{} is not a git repository",
                repo_root.display()
            )));
        }

        let mux = TmuxAdapter::new();
        if !mux.is_installed() {
            return Err(Error::ToolMissing("tmux"));
        }

        let store = Store::new(&repo_root);

        Ok(Self {
            repo,
            mux,
            store,
            config,
            repo_root,
        })
    }

    pub fn repo(&self) -> &GitRepo {
        &self.repo
    }

    pub fn mux(&self) -> &TmuxAdapter {
        &self.mux
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}
