//! Item model - books and folders of the library tree.

use serde::{Deserialize, Serialize};
use crate::path::RelativePath;
use crate::progress::{book_percent, ItemProgress, FULL_PERCENT};
use crate::Time;

/// Whether an item is a playable leaf or a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Playable leaf
    Book,
    /// Container of books and folders
    Folder,
}

impl ItemKind {
    /// Lowercase name used in listings.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Book => "book",
            ItemKind::Folder => "folder",
        }
    }
}

/// A node in a library tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier
    pub relative_path: RelativePath,

    /// Display title
    pub title: String,

    /// Book or folder
    pub kind: ItemKind,

    /// Owning folder, `None` for top-level items
    #[serde(default)]
    pub parent: Option<RelativePath>,

    /// Ordered child paths (folders only)
    #[serde(default)]
    pub children: Vec<RelativePath>,

    /// Length in seconds; derived for folders
    #[serde(default)]
    pub duration: f64,

    /// Playback position in seconds (books only)
    #[serde(default)]
    pub current_time: f64,

    /// Percentage complete (0-100)
    #[serde(default)]
    pub percent_completed: f64,

    /// Finished flag
    #[serde(default)]
    pub is_finished: bool,

    /// User mark on a folder. While set it replaces the derived finished
    /// flag; playback or a mark recorded below the folder releases it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_mark: Option<bool>,

    /// Last recorded playback tick
    #[serde(default)]
    pub last_played_at: Option<Time>,

    /// When the item was added to the library
    pub created_at: Time,
}

impl Item {
    /// Create a top-level book with the given duration in seconds.
    pub fn book(relative_path: RelativePath, duration: f64) -> Self {
        Self::new(relative_path, ItemKind::Book, duration.max(0.0))
    }

    /// Create an empty top-level folder.
    pub fn folder(relative_path: RelativePath) -> Self {
        Self::new(relative_path, ItemKind::Folder, 0.0)
    }

    fn new(relative_path: RelativePath, kind: ItemKind, duration: f64) -> Self {
        Self {
            title: relative_path.file_name().to_string(),
            relative_path,
            kind,
            parent: None,
            children: Vec::new(),
            duration,
            current_time: 0.0,
            percent_completed: 0.0,
            is_finished: false,
            finished_mark: None,
            last_played_at: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// Set the owning folder.
    pub fn with_parent(mut self, parent: RelativePath) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Is this a book?
    pub fn is_book(&self) -> bool {
        self.kind == ItemKind::Book
    }

    /// Is this a folder?
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    /// The derived fields as stored.
    pub fn progress(&self) -> ItemProgress {
        ItemProgress {
            percent_completed: self.percent_completed,
            duration: self.duration,
            is_finished: self.is_finished,
        }
    }

    /// Overwrite the derived fields.
    pub fn apply_progress(&mut self, progress: ItemProgress) {
        self.percent_completed = progress.percent_completed;
        self.duration = progress.duration;
        self.is_finished = progress.is_finished;
    }

    /// Record a playback position on a book.
    ///
    /// The position is clamped to `[0, duration]` and recording clears any
    /// explicit finished override. Returns the book's new progress.
    pub fn record_position(&mut self, current_time: f64, at: Time) -> ItemProgress {
        let upper = self.duration.max(0.0);
        self.current_time = if current_time.is_finite() {
            current_time.clamp(0.0, upper)
        } else {
            0.0
        };
        self.percent_completed = book_percent(self.current_time, self.duration);
        self.is_finished = self.percent_completed >= FULL_PERCENT;
        self.last_played_at = Some(at);
        self.progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> RelativePath {
        RelativePath::new(s).unwrap()
    }

    #[test]
    fn test_book_defaults() {
        let book = Item::book(path("Fiction/dune.m4b"), 3600.0).with_parent(path("Fiction"));
        assert!(book.is_book());
        assert_eq!(book.title, "dune.m4b");
        assert_eq!(book.parent, Some(path("Fiction")));
        assert_eq!(book.percent_completed, 0.0);
        assert!(book.children.is_empty());
    }

    #[test]
    fn test_record_position_clamps_and_finishes() {
        let mut book = Item::book(path("a.mp3"), 200.0);
        let progress = book.record_position(50.0, chrono::Utc::now());
        assert_eq!(progress.percent_completed, 25.0);
        assert!(!progress.is_finished);

        let progress = book.record_position(500.0, chrono::Utc::now());
        assert_eq!(book.current_time, 200.0);
        assert_eq!(progress.percent_completed, 100.0);
        assert!(progress.is_finished);
    }

    #[test]
    fn test_record_position_clears_manual_finish() {
        let mut book = Item::book(path("a.mp3"), 200.0);
        book.is_finished = true;
        book.record_position(20.0, chrono::Utc::now());
        assert!(!book.is_finished);
        assert!(book.last_played_at.is_some());
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{
            "relative_path": "Folder",
            "title": "Folder",
            "kind": "Folder",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert!(item.is_folder());
        assert!(item.parent.is_none());
        assert_eq!(item.duration, 0.0);
        assert!(item.finished_mark.is_none());
    }

    #[test]
    fn test_unmarked_folder_omits_mark() {
        let json = serde_json::to_string(&Item::folder(path("Folder"))).unwrap();
        assert!(!json.contains("finished_mark"));
    }
}
