//! In-memory progress store.

use async_trait::async_trait;
use shelf_core::{Item, ItemProgress, RelativePath, Time};
use super::arena::Arena;
use super::{ProgressStore, Result};

/// Progress store that keeps the whole library in memory.
///
/// `commit` and `rollback` are no-ops; changes are visible immediately.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    arena: Arena,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing arena.
    pub fn from_arena(arena: Arena) -> Self {
        Self { arena }
    }

    /// Borrow the underlying arena.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get(&self, path: &RelativePath) -> Result<Option<Item>> {
        Ok(self.arena.get(path).cloned())
    }

    async fn get_children(&self, folder: &RelativePath) -> Result<Vec<Item>> {
        self.arena.children(folder)
    }

    async fn get_parent(&self, path: &RelativePath) -> Result<Option<Item>> {
        self.arena.parent(path)
    }

    async fn list(&self) -> Result<Vec<Item>> {
        Ok(self.arena.list())
    }

    async fn update(&mut self, path: &RelativePath, progress: ItemProgress) -> Result<()> {
        self.arena.update(path, progress)
    }

    async fn record_position(
        &mut self,
        path: &RelativePath,
        current_time: f64,
        at: Time,
    ) -> Result<ItemProgress> {
        self.arena.record_position(path, current_time, at)
    }

    async fn set_finished(&mut self, path: &RelativePath, finished: bool) -> Result<()> {
        self.arena.set_finished(path, finished)
    }

    async fn clear_finished_mark(&mut self, path: &RelativePath) -> Result<()> {
        self.arena.clear_finished_mark(path)
    }

    async fn insert(&mut self, item: &Item) -> Result<()> {
        self.arena.insert(item)
    }

    async fn remove(&mut self, path: &RelativePath) -> Result<Vec<RelativePath>> {
        self.arena.remove(path)
    }

    async fn move_item(
        &mut self,
        path: &RelativePath,
        new_parent: Option<&RelativePath>,
    ) -> Result<()> {
        self.arena.move_item(path, new_parent)
    }

    async fn commit(&mut self, _message: &str) -> Result<()> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}
