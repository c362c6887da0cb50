//! Error types for the budget engine

use thiserror::Error;

use crate::model::RowKey;

/// Failure reported by the external budget source (network, storage, auth)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("source rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Window, year or comment fetch failed; nothing was merged
    #[error("fetch failed: {0}")]
    Source(#[from] SourceError),

    /// An optimistic save failed and the edited field was rolled back
    #[error("save of {field} for {key} failed and was rolled back: {reason}")]
    EditConflict {
        key: RowKey,
        field: &'static str,
        reason: String,
    },

    #[error("invalid month: {0}")]
    InvalidMonth(String),

    #[error("window has not been loaded yet")]
    NotInitialized,

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
