//! Durable per-repository metadata: the instance records and the
//! crash-safe document store that holds them.

pub mod store;
pub mod types;

pub use store::{generate_id, Store};
pub use types::{Instance, Status, StoreRoot, SubPane};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("state document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StateResult<T> = Result<T, StateError>;
