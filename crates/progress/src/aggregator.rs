//! Folder progress aggregation.
//!
//! After a book's progress or a folder's membership changes, every folder on
//! the path to the top of the library must be re-derived. The aggregator
//! walks that ancestor chain one level at a time, reading only the direct
//! children of each folder, and stops as soon as a folder's recomputed
//! values match what is already stored.

use std::collections::HashSet;
use shelf_core::{folder_progress, Item, RelativePath};
use shelf_storage::ProgressStore;
use tracing::{debug, error, warn};
use crate::config::AggregatorConfig;
use crate::error::{AggregateError, AggregateResult};

/// Why a propagation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Walked past a top-level item
    ReachedRoot,
    /// A folder's recomputed values matched the stored ones
    Unchanged,
}

/// What a single propagation did.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationReport {
    /// Path the propagation was requested for
    pub origin: RelativePath,

    /// Folders recomputed
    pub levels: usize,

    /// Folders written
    pub writes: usize,

    /// Children read across all levels
    pub children_read: usize,

    /// Last folder recomputed, if any
    pub stopped_at: Option<RelativePath>,

    /// Why the walk ended
    pub reason: StopReason,
}

impl PropagationReport {
    fn new(origin: RelativePath) -> Self {
        Self {
            origin,
            levels: 0,
            writes: 0,
            children_read: 0,
            stopped_at: None,
            reason: StopReason::ReachedRoot,
        }
    }

    /// Fold a follow-up propagation into this one.
    pub fn absorb(&mut self, other: PropagationReport) {
        self.levels += other.levels;
        self.writes += other.writes;
        self.children_read += other.children_read;
        if other.levels > 0 {
            self.stopped_at = other.stopped_at;
            self.reason = other.reason;
        }
    }
}

/// Re-derives folder aggregates up an ancestor chain.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    /// Create an aggregator.
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Propagate a progress change upward from `from`.
    ///
    /// A folder is recomputed from its own children first; a book is assumed
    /// to be current already, so the walk begins at its parent. Each level
    /// reads only that folder's direct children. A folder's finished mark, if
    /// set, is kept in place of the derived flag.
    ///
    /// Fails with [`AggregateError::NotFound`] without writing anything when
    /// `from` does not exist. A store write failure aborts the walk; folders
    /// below the failing one keep their new values.
    pub async fn recursive_progress_update<S>(
        &self,
        store: &mut S,
        from: &RelativePath,
    ) -> AggregateResult<PropagationReport>
    where
        S: ProgressStore + ?Sized,
    {
        let result = self.propagate(store, from).await;
        match &result {
            Ok(report) => debug!(
                path = %from,
                levels = report.levels,
                writes = report.writes,
                reason = ?report.reason,
                "Propagated progress"
            ),
            Err(AggregateError::NotFound(_)) => warn!(path = %from, "Progress update for unknown item"),
            Err(e) => error!(path = %from, "Progress propagation aborted: {}", e),
        }
        result
    }

    async fn propagate<S>(&self, store: &mut S, from: &RelativePath) -> AggregateResult<PropagationReport>
    where
        S: ProgressStore + ?Sized,
    {
        let start = store
            .get(from)
            .await?
            .ok_or_else(|| AggregateError::NotFound(from.clone()))?;

        let mut report = PropagationReport::new(from.clone());
        let mut visited = HashSet::new();
        let mut cursor = if start.is_folder() {
            Some(start)
        } else {
            self.parent_of(store, &start).await?
        };

        while let Some(folder) = cursor {
            let path = folder.relative_path.clone();
            if !visited.insert(path.clone()) {
                return Err(AggregateError::CorruptTree(path));
            }

            let children = store.get_children(&path).await?;
            let progress = folder_progress(&children).with_mark(folder.finished_mark);
            report.levels += 1;
            report.children_read += children.len();
            report.stopped_at = Some(path.clone());

            if progress.approx_eq(&folder.progress(), self.config.tolerance) {
                report.reason = StopReason::Unchanged;
                return Ok(report);
            }

            store
                .update(&path, progress)
                .await
                .map_err(|source| AggregateError::StoreWrite {
                    path: path.clone(),
                    source,
                })?;
            report.writes += 1;
            debug!(
                path = %path,
                percent = progress.percent_completed,
                duration = progress.duration,
                finished = progress.is_finished,
                "Updated folder"
            );

            cursor = self.parent_of(store, &folder).await?;
        }

        report.reason = StopReason::ReachedRoot;
        Ok(report)
    }

    async fn parent_of<S>(&self, store: &S, item: &Item) -> AggregateResult<Option<Item>>
    where
        S: ProgressStore + ?Sized,
    {
        match store.get_parent(&item.relative_path).await? {
            Some(parent) if parent.is_folder() => Ok(Some(parent)),
            None if item.parent.is_none() => Ok(None),
            _ => Err(AggregateError::CorruptTree(item.relative_path.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{path, ScriptedStore};
    use shelf_core::ItemProgress;
    use shelf_storage::StorageError;

    async fn record(store: &mut ScriptedStore, book: &str, seconds: f64) {
        store
            .inner_mut()
            .record_position(&path(book), seconds, chrono::Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_weighted_average() {
        let mut store = ScriptedStore::new();
        store.folder("Series", None).await;
        store.book("Series/a", Some("Series"), 10.0).await;
        store.book("Series/b", Some("Series"), 20.0).await;
        store.book("Series/c", Some("Series"), 30.0).await;
        record(&mut store, "Series/a", 10.0).await;
        record(&mut store, "Series/b", 10.0).await;

        let aggregator = Aggregator::default();
        let report = aggregator
            .recursive_progress_update(&mut store, &path("Series/b"))
            .await
            .unwrap();

        let folder = store.item("Series").await;
        assert!((folder.percent_completed - 33.333_333).abs() < 1e-4);
        assert_eq!(folder.duration, 60.0);
        assert!(!folder.is_finished);
        assert_eq!(report.writes, 1);
        assert_eq!(report.reason, StopReason::ReachedRoot);
    }

    #[tokio::test]
    async fn test_zero_duration_child() {
        let mut store = ScriptedStore::new();
        store.folder("Empty", None).await;
        store.book("Empty/silence", Some("Empty"), 0.0).await;
        record(&mut store, "Empty/silence", 5.0).await;

        let aggregator = Aggregator::default();
        aggregator
            .recursive_progress_update(&mut store, &path("Empty"))
            .await
            .unwrap();

        let folder = store.item("Empty").await;
        assert_eq!(folder.percent_completed, 0.0);
        assert_eq!(folder.duration, 0.0);
    }

    #[tokio::test]
    async fn test_idempotent() {
        let mut store = ScriptedStore::new();
        store.folder("A", None).await;
        store.folder("A/B", Some("A")).await;
        store.book("A/B/1", Some("A/B"), 100.0).await;
        store.book("A/2", Some("A"), 300.0).await;
        record(&mut store, "A/B/1", 40.0).await;

        let aggregator = Aggregator::default();
        let first = aggregator
            .recursive_progress_update(&mut store, &path("A/B/1"))
            .await
            .unwrap();
        let after_first = store.inner().list().await.unwrap();

        let second = aggregator
            .recursive_progress_update(&mut store, &path("A/B/1"))
            .await
            .unwrap();
        let after_second = store.inner().list().await.unwrap();

        assert_eq!(first.writes, 2);
        assert_eq!(second.writes, 0);
        assert_eq!(second.reason, StopReason::Unchanged);
        let before: Vec<_> = after_first.iter().map(|i| i.progress()).collect();
        let after: Vec<_> = after_second.iter().map(|i| i.progress()).collect();
        assert_eq!(before, after);
        assert!((store.item("A").await.percent_completed - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_deep_chain_updates_every_ancestor() {
        let mut store = ScriptedStore::new();
        let mut parent: Option<String> = None;
        for depth in 1..=5 {
            let name = match &parent {
                Some(p) => format!("{}/f{}", p, depth),
                None => format!("f{}", depth),
            };
            store.folder(&name, parent.as_deref()).await;
            parent = Some(name);
        }
        let deepest = parent.unwrap();
        let leaf = format!("{}/book", deepest);
        store.book(&leaf, Some(&deepest), 100.0).await;
        record(&mut store, &leaf, 50.0).await;
        store.reset_counters();

        let report = Aggregator::default()
            .recursive_progress_update(&mut store, &path(&leaf))
            .await
            .unwrap();

        assert_eq!(report.levels, 5);
        assert_eq!(report.writes, 5);
        assert_eq!(store.writes().len(), 5);
        assert_eq!(store.item("f1").await.percent_completed, 50.0);
        assert_eq!(report.stopped_at, Some(path("f1")));
    }

    #[tokio::test]
    async fn test_unchanged_ancestor_halts_writes() {
        let mut store = ScriptedStore::new();
        store.folder("f1", None).await;
        store.folder("f1/f2", Some("f1")).await;
        store.book("f1/f2/long", Some("f1/f2"), 100.0).await;
        store.folder("f1/f2/f3", Some("f1/f2")).await;
        store.book("f1/f2/f3/intro", Some("f1/f2/f3"), 0.0).await;

        // Rebuild all aggregates first so only the next change is measured.
        let aggregator = Aggregator::default();
        aggregator
            .recursive_progress_update(&mut store, &path("f1/f2/long"))
            .await
            .unwrap();
        store.reset_counters();

        store
            .inner_mut()
            .set_finished(&path("f1/f2/f3/intro"), true)
            .await
            .unwrap();
        let report = aggregator
            .recursive_progress_update(&mut store, &path("f1/f2/f3/intro"))
            .await
            .unwrap();

        assert_eq!(report.writes, 1);
        assert_eq!(report.reason, StopReason::Unchanged);
        assert_eq!(report.stopped_at, Some(path("f1/f2")));
        assert_eq!(store.writes(), vec![path("f1/f2/f3")]);
        assert!(store.item("f1/f2/f3").await.is_finished);
    }

    #[tokio::test]
    async fn test_large_folder_reads_only_direct_children() {
        let mut store = ScriptedStore::new();
        store.folder("Big", None).await;
        for i in 0..3000 {
            let child = format!("Big/c{}", i);
            store.folder(&child, Some("Big")).await;
            store.book(&format!("{}/part1", child), Some(&child), 60.0).await;
            store.book(&format!("{}/part2", child), Some(&child), 60.0).await;
        }
        record(&mut store, "Big/c42/part1", 60.0).await;
        store.reset_counters();

        let report = Aggregator::default()
            .recursive_progress_update(&mut store, &path("Big/c42/part1"))
            .await
            .unwrap();

        assert_eq!(store.children_calls(), 2);
        assert_eq!(store.children_read(), 2 + 3000);
        assert_eq!(report.children_read, 2 + 3000);
        assert_eq!(report.writes, 2);

        let big = store.item("Big").await;
        // Untouched subfolders were never aggregated, so only c42 carries weight.
        assert_eq!(big.duration, 120.0);
        assert_eq!(big.percent_completed, 50.0);
    }

    #[tokio::test]
    async fn test_not_found_writes_nothing() {
        let mut store = ScriptedStore::new();
        store.folder("A", None).await;
        store.book("A/1", Some("A"), 10.0).await;
        let before = store.inner().list().await.unwrap();
        store.reset_counters();

        let err = Aggregator::default()
            .recursive_progress_update(&mut store, &path("A/missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, AggregateError::NotFound(p) if p == path("A/missing")));
        assert!(store.writes().is_empty());
        let after = store.inner().list().await.unwrap();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.progress(), a.progress());
        }
    }

    #[tokio::test]
    async fn test_write_failure_aborts_upward() {
        let mut store = ScriptedStore::new();
        store.folder("f1", None).await;
        store.folder("f1/f2", Some("f1")).await;
        store.folder("f1/f2/f3", Some("f1/f2")).await;
        store.book("f1/f2/f3/b", Some("f1/f2/f3"), 10.0).await;
        record(&mut store, "f1/f2/f3/b", 5.0).await;
        store.fail_updates_at(path("f1/f2"));

        let err = Aggregator::default()
            .recursive_progress_update(&mut store, &path("f1/f2/f3/b"))
            .await
            .unwrap_err();

        match err {
            AggregateError::StoreWrite { path: failed, source } => {
                assert_eq!(failed, path("f1/f2"));
                assert!(matches!(source, StorageError::Other(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.item("f1/f2/f3").await.percent_completed, 50.0);
        assert_eq!(store.item("f1").await.progress(), ItemProgress::EMPTY);
        assert_eq!(store.writes(), vec![path("f1/f2/f3")]);
    }

    #[tokio::test]
    async fn test_cyclic_parent_chain_is_detected() {
        let mut store = ScriptedStore::new();
        store.folder("f1", None).await;
        store.folder("f1/f2", Some("f1")).await;
        store.book("f1/f2/b", Some("f1/f2"), 10.0).await;
        record(&mut store, "f1/f2/b", 5.0).await;
        store.override_parent(path("f1"), path("f1/f2"));

        let err = Aggregator::default()
            .recursive_progress_update(&mut store, &path("f1/f2/b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::CorruptTree(_)));
    }

    #[tokio::test]
    async fn test_top_level_book_has_nothing_to_propagate() {
        let mut store = ScriptedStore::new();
        store.book("single", None, 10.0).await;

        let report = Aggregator::default()
            .recursive_progress_update(&mut store, &path("single"))
            .await
            .unwrap();
        assert_eq!(report.levels, 0);
        assert_eq!(report.reason, StopReason::ReachedRoot);
    }

    #[tokio::test]
    async fn test_folder_mark_outranks_derived_flag() {
        let mut store = ScriptedStore::new();
        store.folder("Series", None).await;
        store.book("Series/a", Some("Series"), 10.0).await;
        record(&mut store, "Series/a", 10.0).await;
        store.inner_mut().set_finished(&path("Series"), false).await.unwrap();

        let aggregator = Aggregator::default();
        aggregator
            .recursive_progress_update(&mut store, &path("Series/a"))
            .await
            .unwrap();

        let folder = store.item("Series").await;
        assert_eq!(folder.percent_completed, 100.0);
        assert!(!folder.is_finished);
    }
}
