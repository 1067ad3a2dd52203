use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("not a git repository: {0}")]
    NotARepository(String),

    #[error("git {command} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("could not determine default branch")]
    NoDefaultBranch,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid utf-8 in git output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type VcsResult<T> = Result<T, VcsError>;
