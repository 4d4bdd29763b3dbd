//! Instrumented store used by the aggregator and library tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use shelf_core::{Item, ItemProgress, RelativePath, Time};
use shelf_storage::{MemoryStore, ProgressStore, Result, StorageError};

pub fn path(s: &str) -> RelativePath {
    RelativePath::new(s).unwrap()
}

/// Wraps a [`MemoryStore`], counting reads and writes and injecting faults.
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    children_calls: AtomicUsize,
    children_read: AtomicUsize,
    writes: Vec<RelativePath>,
    fail_updates_at: Option<RelativePath>,
    parent_overrides: HashMap<RelativePath, RelativePath>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut MemoryStore {
        &mut self.inner
    }

    pub async fn folder(&mut self, name: &str, parent: Option<&str>) {
        let mut item = Item::folder(path(name));
        item.parent = parent.map(path);
        self.inner.insert(&item).await.unwrap();
    }

    pub async fn book(&mut self, name: &str, parent: Option<&str>, duration: f64) {
        let mut item = Item::book(path(name), duration);
        item.parent = parent.map(path);
        self.inner.insert(&item).await.unwrap();
    }

    pub async fn item(&self, name: &str) -> Item {
        self.inner.get(&path(name)).await.unwrap().unwrap()
    }

    pub fn reset_counters(&mut self) {
        self.children_calls.store(0, Ordering::SeqCst);
        self.children_read.store(0, Ordering::SeqCst);
        self.writes.clear();
    }

    pub fn children_calls(&self) -> usize {
        self.children_calls.load(Ordering::SeqCst)
    }

    pub fn children_read(&self) -> usize {
        self.children_read.load(Ordering::SeqCst)
    }

    /// Successful `update` calls, in order.
    pub fn writes(&self) -> Vec<RelativePath> {
        self.writes.clone()
    }

    pub fn fail_updates_at(&mut self, path: RelativePath) {
        self.fail_updates_at = Some(path);
    }

    /// Make `get_parent(child)` answer `parent` regardless of the tree.
    pub fn override_parent(&mut self, child: RelativePath, parent: RelativePath) {
        self.parent_overrides.insert(child, parent);
    }
}

#[async_trait]
impl ProgressStore for ScriptedStore {
    async fn get(&self, path: &RelativePath) -> Result<Option<Item>> {
        self.inner.get(path).await
    }

    async fn get_children(&self, folder: &RelativePath) -> Result<Vec<Item>> {
        let children = self.inner.get_children(folder).await?;
        self.children_calls.fetch_add(1, Ordering::SeqCst);
        self.children_read.fetch_add(children.len(), Ordering::SeqCst);
        Ok(children)
    }

    async fn get_parent(&self, path: &RelativePath) -> Result<Option<Item>> {
        match self.parent_overrides.get(path) {
            Some(parent) => self.inner.get(parent).await,
            None => self.inner.get_parent(path).await,
        }
    }

    async fn list(&self) -> Result<Vec<Item>> {
        self.inner.list().await
    }

    async fn update(&mut self, path: &RelativePath, progress: ItemProgress) -> Result<()> {
        if self.fail_updates_at.as_ref() == Some(path) {
            return Err(StorageError::Other(format!("injected failure at {}", path)));
        }
        self.inner.update(path, progress).await?;
        self.writes.push(path.clone());
        Ok(())
    }

    async fn record_position(
        &mut self,
        path: &RelativePath,
        current_time: f64,
        at: Time,
    ) -> Result<ItemProgress> {
        self.inner.record_position(path, current_time, at).await
    }

    async fn set_finished(&mut self, path: &RelativePath, finished: bool) -> Result<()> {
        self.inner.set_finished(path, finished).await
    }

    async fn clear_finished_mark(&mut self, path: &RelativePath) -> Result<()> {
        self.inner.clear_finished_mark(path).await
    }

    async fn insert(&mut self, item: &Item) -> Result<()> {
        self.inner.insert(item).await
    }

    async fn remove(&mut self, path: &RelativePath) -> Result<Vec<RelativePath>> {
        self.inner.remove(path).await
    }

    async fn move_item(
        &mut self,
        path: &RelativePath,
        new_parent: Option<&RelativePath>,
    ) -> Result<()> {
        self.inner.move_item(path, new_parent).await
    }

    async fn commit(&mut self, message: &str) -> Result<()> {
        self.inner.commit(message).await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.inner.rollback().await
    }
}
