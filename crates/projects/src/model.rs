//! The project model: watched directory, archive destination, cached listing.
//!
//! All state is owned by one actor task. [`ProjectModel`] is a cheap,
//! cloneable handle that sends commands to it. Reads go through a published
//! [`ModelSnapshot`] and never touch the filesystem.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use {
    tokio::sync::{broadcast, mpsc, oneshot, watch},
    tracing::{debug, info, warn},
};

use crate::{
    archive::move_entry,
    error::{Error, Result},
    listing::list_subdirectories_blocking,
    store::{PathKey, PathStore},
    types::{ModelEvent, ModelSnapshot, SubdirectoryEntry},
    watcher::DirectoryWatcher,
};

const EVENT_CAPACITY: usize = 64;

/// Tunables for the project model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// How long the watcher collects filesystem events before reporting a batch.
    pub debounce: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Initialize {
        reply: Reply<()>,
    },
    SelectWatchedDirectory {
        path: PathBuf,
        reply: Reply<()>,
    },
    SelectArchiveDestination {
        path: PathBuf,
        reply: Reply<()>,
    },
    Forget {
        key: PathKey,
        reply: Reply<()>,
    },
    Refresh {
        reply: Reply<()>,
    },
    ArchiveEntry {
        index: usize,
        reply: Reply<PathBuf>,
    },
    WatchFired {
        generation: u64,
    },
    ListingReady {
        generation: u64,
        sequence: u64,
        result: Result<Vec<SubdirectoryEntry>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the project model actor.
///
/// The actor runs until [`ProjectModel::shutdown`] is called or the last
/// handle is dropped. Either way the watcher is stopped before it exits.
#[derive(Clone)]
pub struct ProjectModel {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<ModelSnapshot>,
    events: broadcast::Sender<ModelEvent>,
}

impl ProjectModel {
    /// Start the model on the current tokio runtime.
    ///
    /// The model starts empty; call [`ProjectModel::initialize`] to restore
    /// the persisted directories.
    pub fn spawn(paths: PathStore, config: ModelConfig) -> Self {
        Self::spawn_with_watcher(paths, config, DirectoryWatcher::new())
    }

    fn spawn_with_watcher(
        paths: PathStore,
        config: ModelConfig,
        watcher: DirectoryWatcher,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(ModelSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = ModelActor::new(
            paths,
            config,
            watcher,
            commands.downgrade(),
            snapshot_tx,
            events.clone(),
        );
        tokio::spawn(actor.run(rx));

        Self {
            commands,
            snapshot,
            events,
        }
    }

    /// Restore the watched directory and archive destination from the store.
    pub async fn initialize(&self) -> Result<()> {
        self.request(|reply| Command::Initialize { reply }).await
    }

    /// Make `path` the watched directory, replacing the listing and the
    /// subscription. On failure nothing changes.
    pub async fn select_watched_directory(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.request(|reply| Command::SelectWatchedDirectory { path, reply })
            .await
    }

    /// Make `path` the archive destination. Its existence is checked only
    /// when archiving.
    pub async fn select_archive_destination(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.request(|reply| Command::SelectArchiveDestination { path, reply })
            .await
    }

    /// Drop the stored and in-memory value for `key`.
    pub async fn forget(&self, key: PathKey) -> Result<()> {
        self.request(|reply| Command::Forget { key, reply }).await
    }

    /// Re-list the watched directory now. A no-op when nothing is watched.
    pub async fn refresh(&self) -> Result<()> {
        self.request(|reply| Command::Refresh { reply }).await
    }

    /// Move `current_listing()[index]` into the archive destination and
    /// return its new path.
    pub async fn archive_entry(&self, index: usize) -> Result<PathBuf> {
        self.request(|reply| Command::ArchiveEntry { index, reply })
            .await
    }

    /// Stop watching and end the actor. Further requests fail with
    /// [`Error::ModelClosed`].
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn current_listing(&self) -> Arc<[SubdirectoryEntry]> {
        self.snapshot.borrow().listing.clone()
    }

    pub fn watched_directory(&self) -> Option<PathBuf> {
        self.snapshot.borrow().watched_directory.clone()
    }

    pub fn archive_destination(&self) -> Option<PathBuf> {
        self.snapshot.borrow().archive_destination.clone()
    }

    /// Whether a live subscription is keeping the listing up to date.
    pub fn is_watching(&self) -> bool {
        self.snapshot.borrow().watching
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.events.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| Error::ModelClosed)?;
        rx.await.map_err(|_| Error::ModelClosed)?
    }
}

struct ModelActor {
    paths: PathStore,
    config: ModelConfig,
    /// Weak so that callbacks and listings never keep the actor alive.
    commands: mpsc::WeakUnboundedSender<Command>,
    snapshot: watch::Sender<ModelSnapshot>,
    events: broadcast::Sender<ModelEvent>,
    watcher: DirectoryWatcher,
    watched_directory: Option<PathBuf>,
    archive_destination: Option<PathBuf>,
    listing: Arc<[SubdirectoryEntry]>,
    /// Bumped on every change of watched directory; stale callbacks and
    /// listings carry an older value and are dropped.
    generation: u64,
    next_sequence: u64,
    applied_sequence: u64,
}

impl ModelActor {
    fn new(
        paths: PathStore,
        config: ModelConfig,
        watcher: DirectoryWatcher,
        commands: mpsc::WeakUnboundedSender<Command>,
        snapshot: watch::Sender<ModelSnapshot>,
        events: broadcast::Sender<ModelEvent>,
    ) -> Self {
        Self {
            paths,
            config,
            commands,
            snapshot,
            events,
            watcher,
            watched_directory: None,
            archive_destination: None,
            listing: Arc::from(Vec::new()),
            generation: 0,
            next_sequence: 0,
            applied_sequence: 0,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Initialize { reply } => {
                    let _ = reply.send(self.initialize().await);
                },
                Command::SelectWatchedDirectory { path, reply } => {
                    let _ = reply.send(self.select_watched_directory(path, true).await);
                },
                Command::SelectArchiveDestination { path, reply } => {
                    let _ = reply.send(self.select_archive_destination(path).await);
                },
                Command::Forget { key, reply } => {
                    let _ = reply.send(self.forget(key).await);
                },
                Command::Refresh { reply } => {
                    let _ = reply.send(self.refresh().await);
                },
                Command::ArchiveEntry { index, reply } => {
                    let _ = reply.send(self.archive_entry(index).await);
                },
                Command::WatchFired { generation } => self.on_watch_fired(generation),
                Command::ListingReady {
                    generation,
                    sequence,
                    result,
                } => self.on_listing_ready(generation, sequence, result),
                Command::Shutdown { reply } => {
                    self.watcher.stop();
                    let _ = reply.send(());
                    break;
                },
            }
        }
        self.watcher.stop();
        debug!("project model stopped");
    }

    async fn initialize(&mut self) -> Result<()> {
        let archive_destination = self.paths.load(PathKey::ArchiveDestination).await?;
        let watched_directory = self.paths.load(PathKey::WatchedDirectory).await?;
        self.archive_destination = archive_destination;

        if let Some(path) = watched_directory {
            match self.select_watched_directory(path.clone(), false).await {
                Ok(()) => info!(dir = %path.display(), "restored watched directory"),
                Err(e @ Error::DirectoryUnreadable { .. }) => {
                    warn!(error = %e, "stored watched directory is unreadable, forgetting it");
                    self.paths.clear(PathKey::WatchedDirectory).await?;
                },
                Err(e) => return Err(e),
            }
        }

        self.publish();
        Ok(())
    }

    async fn select_watched_directory(&mut self, path: PathBuf, persist: bool) -> Result<()> {
        let sequence = self.take_sequence();
        let entries = list_subdirectories_blocking(path.clone()).await?;
        if persist {
            self.paths.save(PathKey::WatchedDirectory, &path).await?;
        }

        self.watcher.stop();
        self.generation += 1;
        self.watched_directory = Some(path.clone());
        self.set_listing(sequence, entries);
        self.start_watching(&path);
        self.publish();
        self.emit(ModelEvent::ListingChanged);
        info!(dir = %path.display(), entries = self.listing.len(), "selected watched directory");
        Ok(())
    }

    async fn select_archive_destination(&mut self, path: PathBuf) -> Result<()> {
        self.paths.save(PathKey::ArchiveDestination, &path).await?;
        info!(dir = %path.display(), "selected archive destination");
        self.archive_destination = Some(path);
        self.publish();
        Ok(())
    }

    async fn forget(&mut self, key: PathKey) -> Result<()> {
        self.paths.clear(key).await?;
        match key {
            PathKey::ArchiveDestination => {
                self.archive_destination = None;
                self.publish();
            },
            PathKey::WatchedDirectory => {
                self.watcher.stop();
                self.generation += 1;
                self.watched_directory = None;
                let sequence = self.take_sequence();
                self.set_listing(sequence, Vec::new());
                self.publish();
                self.emit(ModelEvent::ListingChanged);
            },
        }
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        let Some(path) = self.watched_directory.clone() else {
            return Ok(());
        };
        let sequence = self.take_sequence();
        let entries = list_subdirectories_blocking(path).await?;
        self.apply_listing(sequence, entries);
        Ok(())
    }

    async fn archive_entry(&mut self, index: usize) -> Result<PathBuf> {
        let archive_dir = self
            .archive_destination
            .clone()
            .ok_or(Error::ArchiveDestinationNotSet)?;
        let entry = self
            .listing
            .get(index)
            .cloned()
            .ok_or(Error::InvalidIndex {
                index,
                len: self.listing.len(),
            })?;

        let destination = archive_dir.join(&entry.name);
        // Not atomic with the move below; a concurrent writer can still race us.
        if destination.symlink_metadata().is_ok() {
            return Err(Error::DestinationAlreadyExists { name: entry.name });
        }

        let (from, to) = (entry.path.clone(), destination.clone());
        tokio::task::spawn_blocking(move || move_entry(&from, &to))
            .await
            .map_err(|e| {
                Error::move_failed(&entry.path, &destination, std::io::Error::other(e))
            })??;
        info!(from = %entry.path.display(), to = %destination.display(), "archived project");

        if let Some(watched) = self.watched_directory.clone() {
            let sequence = self.take_sequence();
            match list_subdirectories_blocking(watched).await {
                Ok(entries) => self.apply_listing(sequence, entries),
                Err(e) => warn!(error = %e, "failed to refresh listing after archiving"),
            }
        }

        self.emit(ModelEvent::ArchiveCompleted {
            source: entry.path,
            destination: destination.clone(),
        });
        Ok(destination)
    }

    fn start_watching(&mut self, path: &Path) {
        let generation = self.generation;
        let commands = self.commands.clone();
        let started = self.watcher.start(path, self.config.debounce, move || {
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::WatchFired { generation });
            }
        });
        if let Err(e) = started {
            warn!(error = %e, "watching unavailable, listing updates on manual refresh only");
            self.emit(ModelEvent::WatchUnavailable {
                path: path.to_path_buf(),
            });
        }
    }

    fn on_watch_fired(&mut self, generation: u64) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping stale watch event");
            return;
        }
        let (Some(path), Some(tx)) = (self.watched_directory.clone(), self.commands.upgrade())
        else {
            return;
        };
        let sequence = self.take_sequence();
        tokio::spawn(async move {
            let result = list_subdirectories_blocking(path).await;
            let _ = tx.send(Command::ListingReady {
                generation,
                sequence,
                result,
            });
        });
    }

    fn on_listing_ready(
        &mut self,
        generation: u64,
        sequence: u64,
        result: Result<Vec<SubdirectoryEntry>>,
    ) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping listing for a superseded directory");
            return;
        }
        match result {
            Ok(entries) => self.apply_listing(sequence, entries),
            Err(e) => warn!(error = %e, "failed to refresh listing after change notification"),
        }
    }

    fn take_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    /// Replace the listing unless a newer one has already been applied.
    fn set_listing(&mut self, sequence: u64, entries: Vec<SubdirectoryEntry>) -> bool {
        if sequence < self.applied_sequence {
            debug!(sequence, applied = self.applied_sequence, "dropping out-of-order listing");
            return false;
        }
        self.applied_sequence = sequence;
        self.listing = Arc::from(entries);
        true
    }

    fn apply_listing(&mut self, sequence: u64, entries: Vec<SubdirectoryEntry>) {
        if self.set_listing(sequence, entries) {
            self.publish();
            self.emit(ModelEvent::ListingChanged);
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(ModelSnapshot {
            watched_directory: self.watched_directory.clone(),
            archive_destination: self.archive_destination.clone(),
            listing: self.listing.clone(),
            watching: self.watcher.is_watching(),
        });
    }

    fn emit(&self, event: ModelEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
