//! JSON file storage implementation.
//!
//! The library is held in memory and written as a single JSON document on
//! `commit`. Writes replace the file through a temporary sibling and a
//! rename, so a crash never leaves a half-written library behind.

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use shelf_core::{Item, ItemProgress, RelativePath, Time};
use tokio::fs;
use tracing::{debug, info};
use super::arena::{Arena, LibrarySnapshot};
use super::{ProgressStore, Result};

/// File-backed JSON progress store.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    arena: Arena,
    pending: bool,
}

impl JsonStore {
    /// Open a library file, starting empty when it does not exist yet.
    ///
    /// The parent directory is created if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let arena = load_arena(&path).await?;
        debug!(path = %path.display(), items = arena.len(), "Opened library");

        Ok(Self {
            path,
            arena,
            pending: false,
        })
    }

    /// Location of the library file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are uncommitted changes.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    fn touch(&mut self) {
        self.pending = true;
    }
}

#[async_trait]
impl ProgressStore for JsonStore {
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
        self.arena.update(path, progress)?;
        self.touch();
        Ok(())
    }

    async fn record_position(
        &mut self,
        path: &RelativePath,
        current_time: f64,
        at: Time,
    ) -> Result<ItemProgress> {
        let progress = self.arena.record_position(path, current_time, at)?;
        self.touch();
        Ok(progress)
    }

    async fn set_finished(&mut self, path: &RelativePath, finished: bool) -> Result<()> {
        self.arena.set_finished(path, finished)?;
        self.touch();
        Ok(())
    }

    async fn clear_finished_mark(&mut self, path: &RelativePath) -> Result<()> {
        self.arena.clear_finished_mark(path)?;
        self.touch();
        Ok(())
    }

    async fn insert(&mut self, item: &Item) -> Result<()> {
        self.arena.insert(item)?;
        self.touch();
        Ok(())
    }

    async fn remove(&mut self, path: &RelativePath) -> Result<Vec<RelativePath>> {
        let removed = self.arena.remove(path)?;
        self.touch();
        Ok(removed)
    }

    async fn move_item(
        &mut self,
        path: &RelativePath,
        new_parent: Option<&RelativePath>,
    ) -> Result<()> {
        self.arena.move_item(path, new_parent)?;
        self.touch();
        Ok(())
    }

    async fn commit(&mut self, message: &str) -> Result<()> {
        if !self.pending {
            return Ok(());
        }

        let json = serde_json::to_string_pretty(&self.arena.to_snapshot())?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, &self.path).await?;

        self.pending = false;
        info!(path = %self.path.display(), "Committed: {}", message);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.arena = load_arena(&self.path).await?;
        self.pending = false;
        debug!(path = %self.path.display(), "Rolled back pending changes");
        Ok(())
    }
}

async fn load_arena(path: &Path) -> Result<Arena> {
    match read_json::<LibrarySnapshot>(path).await? {
        Some(snapshot) => Arena::from_snapshot(snapshot),
        None => Ok(Arena::new()),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
