//! Library worker.
//!
//! Moves a [`Library`] onto its own task and feeds it commands through a
//! bounded mailbox. Callers on any task hold a cloneable [`LibraryHandle`];
//! commands are applied one at a time in arrival order.

use shelf_core::{LibraryCommand, RelativePath};
use shelf_storage::ProgressStore;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use crate::error::{LibraryError, Result};
use crate::library::{CommandOutcome, Library};

struct Envelope {
    command: LibraryCommand,
    reply: oneshot::Sender<Result<CommandOutcome>>,
}

/// Cloneable sender side of a library worker.
#[derive(Clone)]
pub struct LibraryHandle {
    tx: mpsc::Sender<Envelope>,
}

impl std::fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl LibraryHandle {
    /// Submit a command and wait for its outcome.
    pub async fn send(&self, command: LibraryCommand) -> Result<CommandOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| LibraryError::WorkerGone)?;
        rx.await.map_err(|_| LibraryError::WorkerGone)?
    }

    /// Submit `ProgressChanged { path }`.
    pub async fn progress_changed(&self, path: RelativePath) -> Result<CommandOutcome> {
        self.send(LibraryCommand::ProgressChanged { path }).await
    }

    /// Submit a playback tick.
    pub async fn record_playback(&self, path: RelativePath, current_time: f64) -> Result<CommandOutcome> {
        self.send(LibraryCommand::RecordPlayback { path, current_time }).await
    }
}

/// Spawn a worker owning `library`.
///
/// The worker exits once every handle is dropped, committing any pending
/// changes on the way out.
pub fn spawn_library_worker<S>(library: Library<S>) -> (LibraryHandle, JoinHandle<()>)
where
    S: ProgressStore + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Envelope>(library.config().mailbox_capacity.max(1));

    let task = tokio::spawn(async move {
        info!("Library worker started");
        while let Some(Envelope { command, reply }) = rx.recv().await {
            let name = command.name();
            let outcome = library.apply(command).await;
            if let Err(e) = &outcome {
                error!(command = name, "Library command failed: {}", e);
            }
            if reply.send(outcome).is_err() {
                debug!(command = name, "Caller went away before the reply");
            }
        }

        if let Err(e) = library.commit("worker shutdown").await {
            error!("Failed to commit on shutdown: {}", e);
        }
        info!("Library worker stopped");
    });

    (LibraryHandle { tx }, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LibraryConfig;
    use crate::test_support::path;
    use shelf_core::Item;
    use shelf_storage::MemoryStore;

    #[tokio::test]
    async fn test_handle_round_trip() {
        let library = Library::new(MemoryStore::new(), LibraryConfig::default());
        let store = library.store();
        let (handle, task) = spawn_library_worker(library);

        handle
            .send(LibraryCommand::AddItem { item: Item::folder(path("Podcasts")) })
            .await
            .unwrap();
        handle
            .send(LibraryCommand::AddItem {
                item: Item::book(path("Podcasts/ep1"), 40.0).with_parent(path("Podcasts")),
            })
            .await
            .unwrap();

        let outcome = handle.record_playback(path("Podcasts/ep1"), 10.0).await.unwrap();
        assert_eq!(outcome.writes(), 1);

        let outcome = handle.progress_changed(path("Podcasts")).await.unwrap();
        assert_eq!(outcome.writes(), 0);

        drop(handle);
        task.await.unwrap();

        let folder = store.lock().await.get(&path("Podcasts")).await.unwrap().unwrap();
        assert_eq!(folder.percent_completed, 25.0);
    }

    #[tokio::test]
    async fn test_concurrent_ticks_are_serialized() {
        let library = Library::new(MemoryStore::new(), LibraryConfig::default());
        let store = library.store();
        let (handle, task) = spawn_library_worker(library);

        handle
            .send(LibraryCommand::AddItem { item: Item::folder(path("Shelf")) })
            .await
            .unwrap();
        for i in 0..8 {
            handle
                .send(LibraryCommand::AddItem {
                    item: Item::book(path(&format!("Shelf/b{}", i)), 100.0).with_parent(path("Shelf")),
                })
                .await
                .unwrap();
        }

        let mut joins = Vec::new();
        for i in 0..8 {
            let handle = handle.clone();
            joins.push(tokio::spawn(async move {
                handle
                    .record_playback(path(&format!("Shelf/b{}", i)), 100.0)
                    .await
                    .unwrap();
            }));
        }
        for join in joins {
            join.await.unwrap();
        }

        drop(handle);
        task.await.unwrap();

        let shelf = store.lock().await.get(&path("Shelf")).await.unwrap().unwrap();
        assert_eq!(shelf.percent_completed, 100.0);
        assert!(shelf.is_finished);
    }

    #[tokio::test]
    async fn test_errors_reach_the_caller() {
        let library = Library::new(MemoryStore::new(), LibraryConfig::default());
        let (handle, task) = spawn_library_worker(library);

        let err = handle.progress_changed(path("missing")).await.unwrap_err();
        assert!(err.is_not_found());

        task.abort();
        let _ = task.await;
        let err = handle.progress_changed(path("missing")).await.unwrap_err();
        assert!(matches!(err, LibraryError::WorkerGone));
    }
}
