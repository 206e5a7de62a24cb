use thiserror::Error;

/// Errors surfaced by a [`ChatService`](crate::ChatService) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("unknown group {0}")]
    UnknownGroup(String),
    #[error("loading page {page} of group {group_id} failed: {reason}")]
    LoadFailed {
        group_id: String,
        page: u32,
        reason: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
}
