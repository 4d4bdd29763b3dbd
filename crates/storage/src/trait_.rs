//! Progress store trait abstraction.

use async_trait::async_trait;
use shelf_core::{Item, ItemProgress, RelativePath, Time};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(RelativePath),

    /// An item with this path already exists
    #[error("Already exists: {0}")]
    AlreadyExists(RelativePath),

    /// The path belonged to an item removed earlier in this session
    #[error("Path was removed and cannot be reused: {0}")]
    PathReused(RelativePath),

    /// Operation requires a folder
    #[error("Not a folder: {0}")]
    NotAFolder(RelativePath),

    /// Operation requires a book
    #[error("Not a book: {0}")]
    NotABook(RelativePath),

    /// Move would create a cycle
    #[error("Cannot move {path} into {target}")]
    InvalidMove {
        /// Item being moved
        path: RelativePath,
        /// Requested new parent
        target: RelativePath,
    },

    /// Item fields are inconsistent with its kind
    #[error("Invalid item {0}: {1}")]
    InvalidItem(RelativePath, String),

    /// Persisted library violates tree invariants
    #[error("Corrupt library: {0}")]
    Corrupt(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Persistence interface for a library tree.
///
/// Reads return owned items. Writes are single-item; callers must not assume
/// multi-item transactions beyond `commit`/`rollback` of pending changes.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    // === Reads ===

    /// Load an item by path.
    async fn get(&self, path: &RelativePath) -> Result<Option<Item>>;

    /// Load a folder's direct children in order.
    async fn get_children(&self, folder: &RelativePath) -> Result<Vec<Item>>;

    /// Load the folder that owns `path`, if any.
    async fn get_parent(&self, path: &RelativePath) -> Result<Option<Item>>;

    /// List every item in the library.
    async fn list(&self) -> Result<Vec<Item>>;

    // === Derived fields ===

    /// Write an item's derived progress fields.
    async fn update(&mut self, path: &RelativePath, progress: ItemProgress) -> Result<()>;

    // === Playback and user actions ===

    /// Record a playback position on a book and return its new progress.
    async fn record_position(
        &mut self,
        path: &RelativePath,
        current_time: f64,
        at: Time,
    ) -> Result<ItemProgress>;

    /// Set or clear the finished flag of a single item. Folders keep the
    /// value as a mark until [`clear_finished_mark`](Self::clear_finished_mark).
    async fn set_finished(&mut self, path: &RelativePath, finished: bool) -> Result<()>;

    /// Drop a folder's finished mark so its flag is derived again.
    async fn clear_finished_mark(&mut self, path: &RelativePath) -> Result<()>;

    // === Structure ===

    /// Add an item under its `parent` (or at the top level).
    async fn insert(&mut self, item: &Item) -> Result<()>;

    /// Remove an item and its whole subtree. Returns the removed paths.
    async fn remove(&mut self, path: &RelativePath) -> Result<Vec<RelativePath>>;

    /// Re-parent an item. `None` moves it to the top level.
    async fn move_item(
        &mut self,
        path: &RelativePath,
        new_parent: Option<&RelativePath>,
    ) -> Result<()>;

    // === Transaction support ===

    /// Persist pending changes.
    async fn commit(&mut self, message: &str) -> Result<()>;

    /// Discard pending changes.
    async fn rollback(&mut self) -> Result<()>;
}
