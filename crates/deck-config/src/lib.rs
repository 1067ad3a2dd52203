//! The human-editable configuration document.
//!
//! Lives at `.deck/config.toml` under the repository root. Every field has a
//! documented default, so a missing file or a partially filled section is
//! always valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Directory under the repository root holding all Deck metadata.
pub const DECK_DIR: &str = ".deck";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub agent: AgentConfig,
    pub editor: EditorConfig,
    pub review: ReviewConfig,
    pub multiplexer: MultiplexerConfig,
    pub ui: UiConfig,
}

/// Worktree placement and per-worktree initialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory under the repository root that receives worktrees.
    pub worktree_dir: String,
    /// Branch new instances are rooted at when none is given.
    pub base_branch: String,
    /// Command sent to every new sub-pane, empty for none.
    pub sub_pane_init_command: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            worktree_dir: ".worktrees".into(),
            base_branch: "master".into(),
            sub_pane_init_command: String::new(),
        }
    }
}

/// How the agent process is launched inside the primary pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Appended as `--model <value>` when non-empty.
    pub model: String,
    /// Appended as `--provider <value>` when non-empty.
    pub provider: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "opencode".into(),
            args: Vec::new(),
            model: String::new(),
            provider: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Editor launcher; empty means `$EDITOR`.
    pub command: String,
    /// Editors that take over a pane rather than opening a GUI window.
    pub terminal_editors: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            terminal_editors: vec!["nvim".into(), "vim".into(), "nano".into(), "emacs".into()],
        }
    }
}

/// Review-request publication settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// `github` or `gitlab`.
    pub provider: String,
    pub auto_delete_branch: bool,
    pub auto_delete_worktree: bool,
    pub draft: bool,
    pub template: String,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            provider: "github".into(),
            auto_delete_branch: false,
            auto_delete_worktree: false,
            draft: false,
            template: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplexerConfig {
    /// Session names are `<prefix>-<sanitised repo basename>`.
    pub session_prefix: String,
    pub default_split: String,
    pub primary_pane_ratio: u8,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            session_prefix: "deck".into(),
            default_split: "horizontal".into(),
            primary_pane_ratio: 70,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_elapsed_time: bool,
    pub show_last_output: bool,
    pub show_sub_pane_count: bool,
    pub show_conflict_warnings: bool,
    pub max_instances: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_elapsed_time: true,
            show_last_output: true,
            show_sub_pane_count: true,
            show_conflict_warnings: true,
            max_instances: 10,
        }
    }
}

pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(DECK_DIR).join(CONFIG_FILE)
}

/// Load `.deck/config.toml`, falling back to defaults when the file is
/// absent. Unknown keys are ignored; missing keys take their defaults.
pub fn load(repo_root: &Path) -> ConfigResult<Config> {
    let path = config_path(repo_root);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(toml::from_str(&text)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}

pub fn save(repo_root: &Path, config: &Config) -> ConfigResult<()> {
    let dir = repo_root.join(DECK_DIR);
    fs::create_dir_all(&dir)?;
    let text = toml::to_string_pretty(config)?;
    fs::write(config_path(repo_root), text)?;
    Ok(())
}

/// Write a default config document unless one already exists.
pub fn init(repo_root: &Path) -> ConfigResult<Config> {
    let config = Config::default();
    if !config_path(repo_root).exists() {
        save(repo_root, &config)?;
    }
    Ok(config)
}
