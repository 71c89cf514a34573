//! Error types for batching and fetch lifecycle

use liveset_core::ResultSetError;

/// Main sync error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The live feed refused the subscription
    #[error("subscription failed: {0}")]
    Subscribe(#[from] FeedError),

    /// The batch coordinator task is gone
    #[error("batch coordinator closed")]
    CoordinatorClosed,

    /// No fetch is running
    #[error("no fetch in progress")]
    NotFetching,

    /// Coordinate lookup failed
    #[error(transparent)]
    Lookup(#[from] ResultSetError),
}

impl SyncError {
    /// Check if error is an invalid-coordinate lookup
    #[inline]
    #[must_use]
    pub fn is_invalid_coordinate(&self) -> bool {
        matches!(self, Self::Lookup(_))
    }
}

/// Errors reported by a live feed collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Query rejected by the source
    #[error("query rejected: {0}")]
    Rejected(String),

    /// Source unreachable
    #[error("feed unavailable: {0}")]
    Unavailable(String),
}
