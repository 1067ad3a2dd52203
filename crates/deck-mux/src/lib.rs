//! Typed driver over the tmux command-line interface.
//!
//! Every verb maps to one tmux invocation with a deterministic argv shape;
//! list verbs pass an explicit `-F` format string so the output is parseable
//! without guessing at the server's display defaults.

pub mod tmux;

pub use tmux::TmuxAdapter;

/// Opaque tmux window handle (`@n` form).
pub type WindowId = String;
/// Opaque tmux pane handle (`%n` form).
pub type PaneId = String;

/// Direction of a pane split, in tmux's own terms: `Horizontal` places the
/// new pane beside the target (`-h`), `Vertical` places it below (`-v`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

impl SplitDirection {
    pub(crate) fn flag(self) -> &'static str {
        match self {
            SplitDirection::Horizontal => "-h",
            SplitDirection::Vertical => "-v",
        }
    }
}

/// One window as reported by `list-windows`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub name: String,
    pub active: bool,
}

/// One pane as reported by `list-panes`.
///
/// `pid` is the pane's top-level process as tmux sees it, which may be the
/// hosting shell rather than the innermost command. `dead` is only observable
/// on windows that carry `remain-on-exit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaneInfo {
    pub id: PaneId,
    pub pid: i32,
    pub dead: bool,
    pub command: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("tmux not available on this system")]
    NotAvailable,
    #[error("tmux {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("unexpected tmux output: {0}")]
    BadOutput(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MuxResult<T> = Result<T, MuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_direction_flags() {
        assert_eq!(SplitDirection::Horizontal.flag(), "-h");
        assert_eq!(SplitDirection::Vertical.flag(), "-v");
    }

    #[test]
    fn mux_error_display() {
        let err = MuxError::CommandFailed {
            command: "kill-window".to_string(),
            stderr: "window not found".to_string(),
        };
        assert_eq!(err.to_string(), "tmux kill-window failed: window not found");
        assert_eq!(
            MuxError::NotAvailable.to_string(),
            "tmux not available on this system"
        );
    }
}
