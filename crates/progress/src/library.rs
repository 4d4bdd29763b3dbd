//! Library service.
//!
//! Owns a progress store behind one async mutex. Playback ticks, user
//! actions, and structural edits all take that lock for their full duration,
//! including the propagation they trigger, so no two propagations interleave.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use shelf_core::{folder_progress, Item, LibraryCommand, RelativePath};
use shelf_storage::{ProgressStore, StorageError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use crate::aggregator::{Aggregator, PropagationReport};
use crate::config::LibraryConfig;
use crate::error::{AggregateError, Result};

/// Boxed future returned by [`Library::apply`].
pub type ApplyFuture<'a> = Pin<Box<dyn Future<Output = Result<CommandOutcome>> + Send + 'a>>;

/// Summary of a full re-derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Folders recomputed
    pub folders: usize,
    /// Folders whose stored values changed
    pub writes: usize,
}

/// Result of applying a [`LibraryCommand`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// One or more ancestor chains were re-derived
    Propagated(Vec<PropagationReport>),

    /// An item and its subtree were removed
    Removed {
        /// Every removed path
        removed: Vec<RelativePath>,
        /// Re-derivation of the former parent's chain
        report: Option<PropagationReport>,
    },

    /// Every folder was re-derived
    Rebuilt(RebuildReport),
}

impl CommandOutcome {
    /// Folder writes performed by the command.
    pub fn writes(&self) -> usize {
        match self {
            CommandOutcome::Propagated(reports) => reports.iter().map(|r| r.writes).sum(),
            CommandOutcome::Removed { report, .. } => report.as_ref().map_or(0, |r| r.writes),
            CommandOutcome::Rebuilt(report) => report.writes,
        }
    }
}

/// Serialized access point to one library.
pub struct Library<S: ProgressStore> {
    store: Arc<Mutex<S>>,
    aggregator: Aggregator,
    config: LibraryConfig,
}

impl<S: ProgressStore> Library<S> {
    /// Create a library over `store`.
    pub fn new(store: S, config: LibraryConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            aggregator: Aggregator::new(config.aggregator),
            config,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Shared handle to the store. Holding its lock blocks every command.
    pub fn store(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    /// Load one item.
    pub async fn get(&self, path: &RelativePath) -> Result<Option<Item>> {
        Ok(self.store.lock().await.get(path).await?)
    }

    /// Load a folder's direct children.
    pub async fn children(&self, folder: &RelativePath) -> Result<Vec<Item>> {
        Ok(self.store.lock().await.get_children(folder).await?)
    }

    /// Every item, sorted by path.
    pub async fn items(&self) -> Result<Vec<Item>> {
        Ok(self.store.lock().await.list().await?)
    }

    /// Re-run propagation from `path` (`ProgressChanged`).
    pub async fn progress_changed(&self, path: &RelativePath) -> Result<PropagationReport> {
        let mut store = self.store.lock().await;
        let report = self.aggregator.recursive_progress_update(&mut *store, path).await?;
        self.finish(&mut *store, "progress changed").await?;
        Ok(report)
    }

    /// Record a playback position on a book and propagate.
    pub async fn record_playback(
        &self,
        path: &RelativePath,
        current_time: f64,
    ) -> Result<PropagationReport> {
        let mut store = self.store.lock().await;
        let progress = store
            .record_position(path, current_time, chrono::Utc::now())
            .await?;
        debug!(
            path = %path,
            current_time,
            percent = progress.percent_completed,
            "Recorded playback"
        );
        let mut report = self.aggregator.recursive_progress_update(&mut *store, path).await?;
        self.release_marks_above(&mut *store, path, &mut report).await?;
        self.finish(&mut *store, "record playback").await?;
        Ok(report)
    }

    /// Mark an item finished or unfinished.
    ///
    /// On a folder the flag is applied to every item below it and kept as a
    /// mark on each folder, so it holds even when the derived flag disagrees
    /// (an empty folder, or books at 100% marked unfinished). Marks on folders
    /// above `path` are released.
    pub async fn mark_finished(&self, path: &RelativePath, finished: bool) -> Result<PropagationReport> {
        let mut store = self.store.lock().await;
        let item = store
            .get(path)
            .await?
            .ok_or_else(|| StorageError::NotFound(path.clone()))?;

        if item.is_folder() {
            let below = descendants(&*store, path).await?;
            let mut folders = Vec::new();
            for child in below {
                store.set_finished(&child.relative_path, finished).await?;
                if child.is_folder() {
                    folders.push(child.relative_path);
                }
            }
            folders.reverse();
            rederive_bottom_up(&mut *store, &folders, self.tolerance()).await?;
        }
        store.set_finished(path, finished).await?;

        info!(path = %path, finished, "Marked finished");
        let mut report = self.aggregator.recursive_progress_update(&mut *store, path).await?;
        self.release_marks_above(&mut *store, path, &mut report).await?;
        self.finish(&mut *store, "mark finished").await?;
        Ok(report)
    }

    /// Import a book or create a folder, then re-derive its parent chain.
    pub async fn add_item(&self, item: Item) -> Result<Option<PropagationReport>> {
        let mut store = self.store.lock().await;
        store.insert(&item).await?;
        info!(path = %item.relative_path, kind = item.kind.as_str(), "Added item");

        let report = match &item.parent {
            Some(parent) => Some(self.aggregator.recursive_progress_update(&mut *store, parent).await?),
            None => None,
        };
        self.finish(&mut *store, "add item").await?;
        Ok(report)
    }

    /// Remove an item with its subtree, then re-derive the former parent chain.
    pub async fn remove_item(
        &self,
        path: &RelativePath,
    ) -> Result<(Vec<RelativePath>, Option<PropagationReport>)> {
        let mut store = self.store.lock().await;
        let parent = store.get_parent(path).await?;
        let removed = store.remove(path).await?;
        info!(path = %path, removed = removed.len(), "Removed item");

        let report = match parent {
            Some(parent) => Some(
                self.aggregator
                    .recursive_progress_update(&mut *store, &parent.relative_path)
                    .await?,
            ),
            None => None,
        };
        self.finish(&mut *store, "remove item").await?;
        Ok((removed, report))
    }

    /// Re-parent an item and re-derive both the old and new parent chains.
    pub async fn move_item(
        &self,
        path: &RelativePath,
        new_parent: Option<&RelativePath>,
    ) -> Result<Vec<PropagationReport>> {
        let mut store = self.store.lock().await;
        let old_parent = store.get_parent(path).await?.map(|p| p.relative_path);
        store.move_item(path, new_parent).await?;
        info!(
            path = %path,
            from = ?old_parent.as_ref().map(|p| p.as_str()),
            to = ?new_parent.map(|p| p.as_str()),
            "Moved item"
        );

        let folders: Vec<RelativePath> = old_parent.into_iter().chain(new_parent.cloned()).collect();
        let mut reports = Vec::new();
        for folder in &folders {
            reports.push(self.aggregator.recursive_progress_update(&mut *store, folder).await?);
        }
        self.finish(&mut *store, "move item").await?;
        Ok(reports)
    }

    /// Re-derive every folder from the leaves up.
    ///
    /// Used after loading a library whose aggregates may be stale.
    pub async fn rebuild(&self) -> Result<RebuildReport> {
        let mut store = self.store.lock().await;
        let folders = folders_deepest_first(&store.list().await?);
        let report = rederive_bottom_up(&mut *store, &folders, self.tolerance()).await?;
        info!(folders = report.folders, writes = report.writes, "Rebuilt library");
        self.finish(&mut *store, "rebuild").await?;
        Ok(report)
    }

    /// Apply a command.
    ///
    /// The future is boxed and `Send` so a worker task can drive it.
    pub fn apply(&self, command: LibraryCommand) -> ApplyFuture<'_> {
        Box::pin(async move {
            debug!(command = command.name(), "Applying command");
            match command {
                LibraryCommand::ProgressChanged { path } => {
                    let report = self.progress_changed(&path).await?;
                    Ok(CommandOutcome::Propagated(vec![report]))
                }
                LibraryCommand::RecordPlayback { path, current_time } => {
                    let report = self.record_playback(&path, current_time).await?;
                    Ok(CommandOutcome::Propagated(vec![report]))
                }
                LibraryCommand::MarkFinished { path, finished } => {
                    let report = self.mark_finished(&path, finished).await?;
                    Ok(CommandOutcome::Propagated(vec![report]))
                }
                LibraryCommand::AddItem { item } => {
                    let report = self.add_item(item).await?;
                    Ok(CommandOutcome::Propagated(report.into_iter().collect()))
                }
                LibraryCommand::RemoveItem { path } => {
                    let (removed, report) = self.remove_item(&path).await?;
                    Ok(CommandOutcome::Removed { removed, report })
                }
                LibraryCommand::MoveItem { path, new_parent } => {
                    let reports = self.move_item(&path, new_parent.as_ref()).await?;
                    Ok(CommandOutcome::Propagated(reports))
                }
                LibraryCommand::Rebuild => Ok(CommandOutcome::Rebuilt(self.rebuild().await?)),
            }
        })
    }

    /// Persist pending changes.
    pub async fn commit(&self, message: &str) -> Result<()> {
        self.store.lock().await.commit(message).await?;
        Ok(())
    }

    fn tolerance(&self) -> f64 {
        self.aggregator.config().tolerance
    }

    /// Drop finished marks on the folders above `path` and re-derive each
    /// of them, nearest first.
    async fn release_marks_above(
        &self,
        store: &mut S,
        path: &RelativePath,
        report: &mut PropagationReport,
    ) -> Result<()> {
        let mut marked = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = store.get_parent(path).await?;
        while let Some(folder) = cursor {
            if !seen.insert(folder.relative_path.clone()) {
                return Err(AggregateError::CorruptTree(folder.relative_path).into());
            }
            if folder.finished_mark.is_some() {
                marked.push(folder.relative_path.clone());
            }
            cursor = store.get_parent(&folder.relative_path).await?;
        }

        for folder in &marked {
            store.clear_finished_mark(folder).await?;
            debug!(path = %folder, "Released finished mark");
        }
        for folder in &marked {
            let released = self.aggregator.recursive_progress_update(&mut *store, folder).await?;
            report.absorb(released);
        }
        Ok(())
    }

    async fn finish(&self, store: &mut S, message: &str) -> Result<()> {
        if self.config.auto_commit {
            store.commit(message).await?;
        }
        Ok(())
    }
}

/// Breadth-first list of everything below `root`, excluding `root`.
async fn descendants<S>(store: &S, root: &RelativePath) -> Result<Vec<Item>>
where
    S: ProgressStore + ?Sized,
{
    let mut out = Vec::new();
    let mut queue = VecDeque::from([root.clone()]);
    while let Some(folder) = queue.pop_front() {
        for child in store.get_children(&folder).await? {
            if child.is_folder() {
                queue.push_back(child.relative_path.clone());
            }
            out.push(child);
        }
    }
    Ok(out)
}

/// Folder paths ordered so every folder comes before its parent.
fn folders_deepest_first(items: &[Item]) -> Vec<RelativePath> {
    let parents: HashMap<&RelativePath, Option<&RelativePath>> = items
        .iter()
        .map(|i| (&i.relative_path, i.parent.as_ref()))
        .collect();

    let mut folders: Vec<(usize, RelativePath)> = Vec::new();
    for folder in items.iter().filter(|i| i.is_folder()) {
        let mut depth = 0;
        let mut cursor = folder.parent.as_ref();
        while let Some(parent) = cursor {
            depth += 1;
            cursor = parents.get(parent).copied().flatten();
        }
        folders.push((depth, folder.relative_path.clone()));
    }
    folders.sort_by(|a, b| b.0.cmp(&a.0));
    folders.into_iter().map(|(_, path)| path).collect()
}

/// Recompute folders in the given order, which must list children before
/// their parents. Reads each folder's current stored state so earlier writes
/// are seen by later folders.
async fn rederive_bottom_up<S>(
    store: &mut S,
    folders: &[RelativePath],
    tolerance: f64,
) -> Result<RebuildReport>
where
    S: ProgressStore + ?Sized,
{
    let mut report = RebuildReport::default();
    for path in folders {
        let Some(current) = store.get(path).await? else {
            warn!(path = %path, "Folder vanished during re-derivation");
            continue;
        };
        let children = store.get_children(path).await?;
        let progress = folder_progress(&children).with_mark(current.finished_mark);
        report.folders += 1;
        if !progress.approx_eq(&current.progress(), tolerance) {
            store.update(path, progress).await?;
            report.writes += 1;
        }
    }
    Ok(report)
}
