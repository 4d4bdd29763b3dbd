//! Shelf core data models.
//!
//! Books, folders, and the completion math that ties a library tree
//! together.

#![warn(missing_docs)]

mod path;
mod item;
mod progress;
mod command;

pub use path::{RelativePath, PathError};
pub use item::{Item, ItemKind};
pub use progress::{book_percent, folder_progress, ItemProgress, FULL_PERCENT};
pub use command::LibraryCommand;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
