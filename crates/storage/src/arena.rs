//! In-memory library tree shared by the storage backends.
//!
//! Items live in a map keyed by path; parent and child links are path
//! lookups, never references.

use std::collections::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use shelf_core::{book_percent, Item, ItemProgress, RelativePath, Time, FULL_PERCENT};
use super::{Result, StorageError};

/// Current on-disk snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of a library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    /// Format version
    pub version: u32,

    /// Every item, in no particular order
    pub items: Vec<Item>,

    /// Paths removed during the lifetime of this library
    #[serde(default)]
    pub removed: Vec<RelativePath>,
}

/// Arena of library items.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    items: HashMap<RelativePath, Item>,
    removed: HashSet<RelativePath>,
}

impl Arena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an arena from a snapshot, checking tree invariants.
    pub fn from_snapshot(snapshot: LibrarySnapshot) -> Result<Self> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(StorageError::Corrupt(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut items = HashMap::with_capacity(snapshot.items.len());
        for item in snapshot.items {
            let path = item.relative_path.clone();
            if items.insert(path.clone(), item).is_some() {
                return Err(StorageError::Corrupt(format!("duplicate path {}", path)));
            }
        }

        let arena = Self {
            items,
            removed: snapshot.removed.into_iter().collect(),
        };
        arena.validate()?;
        Ok(arena)
    }

    /// Snapshot the arena for persistence. Items are sorted by path.
    pub fn to_snapshot(&self) -> LibrarySnapshot {
        let mut removed: Vec<_> = self.removed.iter().cloned().collect();
        removed.sort();
        LibrarySnapshot {
            version: SNAPSHOT_VERSION,
            items: self.list(),
            removed,
        }
    }

    fn validate(&self) -> Result<()> {
        for item in self.items.values() {
            let path = &item.relative_path;
            if self.removed.contains(path) {
                return Err(StorageError::Corrupt(format!("{} is both live and removed", path)));
            }
            if item.is_book() && !item.children.is_empty() {
                return Err(StorageError::Corrupt(format!("book {} has children", path)));
            }
            if let Some(parent) = &item.parent {
                let owner = self.items.get(parent).ok_or_else(|| {
                    StorageError::Corrupt(format!("{} references missing parent {}", path, parent))
                })?;
                if !owner.children.contains(path) {
                    return Err(StorageError::Corrupt(format!(
                        "{} is not listed as a child of {}",
                        path, parent
                    )));
                }
            }
            for child in &item.children {
                let listed = self.items.get(child).ok_or_else(|| {
                    StorageError::Corrupt(format!("{} lists missing child {}", path, child))
                })?;
                if listed.parent.as_ref() != Some(path) {
                    return Err(StorageError::Corrupt(format!(
                        "{} lists {} whose parent differs",
                        path, child
                    )));
                }
            }
        }

        // Every chain must reach a top-level item.
        for path in self.items.keys() {
            let mut seen = HashSet::new();
            let mut cursor = Some(path);
            while let Some(current) = cursor {
                if !seen.insert(current) {
                    return Err(StorageError::Corrupt(format!("cycle through {}", current)));
                }
                cursor = self.items.get(current).and_then(|i| i.parent.as_ref());
            }
        }
        Ok(())
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the arena holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Borrow an item.
    pub fn get(&self, path: &RelativePath) -> Option<&Item> {
        self.items.get(path)
    }

    fn get_mut(&mut self, path: &RelativePath) -> Result<&mut Item> {
        self.items
            .get_mut(path)
            .ok_or_else(|| StorageError::NotFound(path.clone()))
    }

    /// Clone a folder's direct children in order.
    pub fn children(&self, folder: &RelativePath) -> Result<Vec<Item>> {
        let folder = self
            .items
            .get(folder)
            .ok_or_else(|| StorageError::NotFound(folder.clone()))?;
        folder
            .children
            .iter()
            .map(|child| {
                self.items
                    .get(child)
                    .cloned()
                    .ok_or_else(|| StorageError::NotFound(child.clone()))
            })
            .collect()
    }

    /// Clone the folder owning `path`.
    pub fn parent(&self, path: &RelativePath) -> Result<Option<Item>> {
        let item = self
            .items
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.clone()))?;
        Ok(item.parent.as_ref().and_then(|p| self.items.get(p)).cloned())
    }

    /// Clone every item, sorted by path.
    pub fn list(&self) -> Vec<Item> {
        let mut items: Vec<_> = self.items.values().cloned().collect();
        items.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        items
    }

    /// Overwrite derived fields.
    pub fn update(&mut self, path: &RelativePath, progress: ItemProgress) -> Result<()> {
        self.get_mut(path)?.apply_progress(progress);
        Ok(())
    }

    /// Record playback on a book.
    pub fn record_position(
        &mut self,
        path: &RelativePath,
        current_time: f64,
        at: Time,
    ) -> Result<ItemProgress> {
        let item = self.get_mut(path)?;
        if !item.is_book() {
            return Err(StorageError::NotABook(path.clone()));
        }
        Ok(item.record_position(current_time, at))
    }

    /// Set the finished flag of one item. On a folder the flag is also kept
    /// as a mark that outranks the derived value.
    pub fn set_finished(&mut self, path: &RelativePath, finished: bool) -> Result<()> {
        let item = self.get_mut(path)?;
        item.is_finished = finished;
        if item.is_folder() {
            item.finished_mark = Some(finished);
        }
        Ok(())
    }

    /// Drop a folder's finished mark. The stored flag is left for the
    /// aggregator to re-derive.
    pub fn clear_finished_mark(&mut self, path: &RelativePath) -> Result<()> {
        self.get_mut(path)?.finished_mark = None;
        Ok(())
    }

    /// Insert a new item and link it into its parent.
    pub fn insert(&mut self, item: &Item) -> Result<()> {
        let path = &item.relative_path;
        if self.removed.contains(path) {
            return Err(StorageError::PathReused(path.clone()));
        }
        if self.items.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.clone()));
        }
        if !item.children.is_empty() {
            return Err(StorageError::InvalidItem(
                path.clone(),
                "children must be inserted individually".to_string(),
            ));
        }

        let mut item = item.clone();
        item.finished_mark = None;
        if item.is_book() {
            if !item.duration.is_finite() || item.duration < 0.0 {
                return Err(StorageError::InvalidItem(
                    path.clone(),
                    format!("invalid duration {}", item.duration),
                ));
            }
            if !item.current_time.is_finite() {
                return Err(StorageError::InvalidItem(
                    path.clone(),
                    format!("invalid position {}", item.current_time),
                ));
            }
            item.current_time = item.current_time.clamp(0.0, item.duration);
            item.percent_completed = book_percent(item.current_time, item.duration);
            item.is_finished |= item.percent_completed >= FULL_PERCENT;
        } else {
            item.current_time = 0.0;
            item.apply_progress(ItemProgress::EMPTY);
        }

        if let Some(parent) = &item.parent {
            let owner = self
                .items
                .get_mut(parent)
                .ok_or_else(|| StorageError::NotFound(parent.clone()))?;
            if !owner.is_folder() {
                return Err(StorageError::NotAFolder(parent.clone()));
            }
            owner.children.push(path.clone());
        }

        self.items.insert(path.clone(), item);
        Ok(())
    }

    /// Remove an item with its subtree; removed paths are tombstoned.
    pub fn remove(&mut self, path: &RelativePath) -> Result<Vec<RelativePath>> {
        let item = self
            .items
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.clone()))?;

        if let Some(parent) = item.parent.clone() {
            if let Some(owner) = self.items.get_mut(&parent) {
                owner.children.retain(|c| c != path);
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![path.clone()];
        while let Some(current) = stack.pop() {
            if let Some(item) = self.items.remove(&current) {
                stack.extend(item.children);
                self.removed.insert(current.clone());
                removed.push(current);
            }
        }
        Ok(removed)
    }

    /// Move an item under `new_parent`, or to the top level.
    pub fn move_item(&mut self, path: &RelativePath, new_parent: Option<&RelativePath>) -> Result<()> {
        let old_parent = self
            .items
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.clone()))?
            .parent
            .clone();

        if let Some(target) = new_parent {
            let folder = self
                .items
                .get(target)
                .ok_or_else(|| StorageError::NotFound(target.clone()))?;
            if !folder.is_folder() {
                return Err(StorageError::NotAFolder(target.clone()));
            }
            // Walk up from the target; meeting `path` means a cycle.
            let mut cursor = Some(target);
            while let Some(current) = cursor {
                if current == path {
                    return Err(StorageError::InvalidMove {
                        path: path.clone(),
                        target: target.clone(),
                    });
                }
                cursor = self.items.get(current).and_then(|i| i.parent.as_ref());
            }
        }

        if old_parent.as_ref() == new_parent {
            return Ok(());
        }

        if let Some(old) = &old_parent {
            if let Some(owner) = self.items.get_mut(old) {
                owner.children.retain(|c| c != path);
            }
        }
        if let Some(target) = new_parent {
            self.get_mut(target)?.children.push(path.clone());
        }
        self.get_mut(path)?.parent = new_parent.cloned();
        Ok(())
    }
}
