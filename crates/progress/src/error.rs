//! Error types for aggregation and library commands.

use shelf_core::RelativePath;
use shelf_storage::StorageError;

/// Result alias for aggregator operations.
pub type AggregateResult<T> = std::result::Result<T, AggregateError>;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Errors raised while propagating progress.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// The starting path does not exist; nothing was written
    #[error("Not found: {0}")]
    NotFound(RelativePath),

    /// The parent chain loops or references a missing folder
    #[error("Corrupt tree at {0}")]
    CorruptTree(RelativePath),

    /// The store rejected a write; levels below `path` were already written
    #[error("Store write failed at {path}: {source}")]
    StoreWrite {
        /// Folder whose write failed
        path: RelativePath,
        /// Underlying failure
        #[source]
        source: StorageError,
    },

    /// The store failed a read
    #[error("Store error: {0}")]
    Store(#[from] StorageError),
}

/// Errors raised by the library service.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// Storage rejected the command
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Propagation failed
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// The library worker is no longer running
    #[error("Library worker has stopped")]
    WorkerGone,
}

impl LibraryError {
    /// True when the command referenced a path that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LibraryError::Storage(StorageError::NotFound(_))
                | LibraryError::Aggregate(AggregateError::NotFound(_))
                | LibraryError::Aggregate(AggregateError::Store(StorageError::NotFound(_)))
        )
    }
}
