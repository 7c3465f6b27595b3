//! Error types for the block-join index

use thiserror::Error;

use crate::record::Position;

pub type Result<T> = std::result::Result<T, BlockJoinError>;

#[derive(Error, Debug)]
pub enum BlockJoinError {
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Position not found: {0}")]
    NotFound(Position),

    #[error("Position {0} is not a parent record")]
    InvalidParent(Position),

    /// Advisory: the parent filter covers fewer positions than the snapshot.
    #[error("Stale parent filter: covers {covered} of {committed} positions")]
    StaleFilter { covered: usize, committed: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Config(String),
}

impl BlockJoinError {
    /// Stable error code for callers that match on kinds across a boundary
    pub fn code(&self) -> &'static str {
        match self {
            BlockJoinError::InvalidBlock(_) => "INVALID_BLOCK",
            BlockJoinError::NotFound(_) => "NOT_FOUND",
            BlockJoinError::InvalidParent(_) => "INVALID_PARENT",
            BlockJoinError::StaleFilter { .. } => "STALE_FILTER",
            BlockJoinError::Config(_) => "INVALID_CONFIG",
            _ => "INTERNAL_ERROR",
        }
    }

    /// True for errors that are warnings rather than failures.
    pub fn is_advisory(&self) -> bool {
        matches!(self, BlockJoinError::StaleFilter { .. })
    }
}
