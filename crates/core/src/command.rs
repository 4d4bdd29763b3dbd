//! Commands accepted by a library's single owner.

use serde::{Deserialize, Serialize};
use crate::item::Item;
use crate::path::RelativePath;

/// A request to change library state.
///
/// Playback ticks and structural edits travel through the same command type
/// so one owner can apply them in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LibraryCommand {
    /// Re-derive aggregates starting at `path`
    ProgressChanged {
        /// Item whose progress changed
        path: RelativePath,
    },

    /// Playback advanced on a book
    RecordPlayback {
        /// Book being played
        path: RelativePath,
        /// New position in seconds
        current_time: f64,
    },

    /// User marked an item finished or unfinished
    MarkFinished {
        /// Book or folder
        path: RelativePath,
        /// New flag
        finished: bool,
    },

    /// Import a book or create a folder
    AddItem {
        /// Item to insert, linked to its `parent`
        item: Item,
    },

    /// Remove an item and its subtree
    RemoveItem {
        /// Item to remove
        path: RelativePath,
    },

    /// Re-parent an item
    MoveItem {
        /// Item to move
        path: RelativePath,
        /// New owning folder; `None` moves it to the top level
        new_parent: Option<RelativePath>,
    },

    /// Re-derive every folder
    Rebuild,
}

impl LibraryCommand {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            LibraryCommand::ProgressChanged { .. } => "progress_changed",
            LibraryCommand::RecordPlayback { .. } => "record_playback",
            LibraryCommand::MarkFinished { .. } => "mark_finished",
            LibraryCommand::AddItem { .. } => "add_item",
            LibraryCommand::RemoveItem { .. } => "remove_item",
            LibraryCommand::MoveItem { .. } => "move_item",
            LibraryCommand::Rebuild => "rebuild",
        }
    }
}
