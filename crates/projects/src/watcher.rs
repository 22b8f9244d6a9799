//! Filesystem watcher for the projects directory.
//!
//! Holds at most one non-recursive subscription and calls back once per
//! debounced batch of changes to the directory's immediate contents.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {
    notify_debouncer_full::{
        DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
        notify::{
            self, EventKind, RecommendedWatcher, RecursiveMode,
            event::{MetadataKind, ModifyKind},
        },
    },
    tracing::{debug, info, warn},
};

use crate::error::{Error, Result};

struct ActiveWatch {
    path: PathBuf,
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

/// A single directory subscription. Either idle or watching one path.
#[derive(Default)]
pub struct DirectoryWatcher {
    active: Option<ActiveWatch>,
    #[cfg(test)]
    refuse_start: bool,
}

impl DirectoryWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A watcher whose `start` always fails, as on a filesystem without
    /// change notifications.
    #[cfg(test)]
    pub(crate) fn refusing() -> Self {
        Self {
            active: None,
            refuse_start: true,
        }
    }

    /// Subscribe to changes in `dir`, calling `on_change` once per batch.
    ///
    /// Any previous subscription is stopped first. On failure the watcher
    /// stays idle and [`Error::WatchUnavailable`] is returned.
    pub fn start<F>(&mut self, dir: &Path, debounce: Duration, on_change: F) -> Result<()>
    where
        F: Fn() + Send + 'static,
    {
        if self.active.is_some() {
            warn!(dir = %dir.display(), "watcher already running, stopping previous subscription");
            self.stop();
        }

        let unavailable = |source: notify::Error| Error::WatchUnavailable {
            path: dir.to_path_buf(),
            source,
        };

        #[cfg(test)]
        if self.refuse_start {
            return Err(unavailable(notify::Error::generic(
                "change notifications disabled",
            )));
        }

        let mut debouncer = new_debouncer(
            debounce,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let mut changed = false;
                    for event in &events {
                        if is_relevant(&event.kind) {
                            debug!(kind = ?event.kind, paths = ?event.paths, "directory watcher event");
                            changed = true;
                        }
                    }
                    if changed {
                        on_change();
                    }
                },
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "directory watcher error");
                    }
                },
            },
        )
        .map_err(unavailable)?;

        debouncer
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(unavailable)?;
        info!(dir = %dir.display(), "watching directory");

        self.active = Some(ActiveWatch {
            path: dir.to_path_buf(),
            debouncer,
        });
        Ok(())
    }

    /// Cancel the subscription and release the OS handle. Blocks until the
    /// debouncer thread has exited, so no callback runs after this returns.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.debouncer.stop();
            info!(dir = %active.path.display(), "stopped watching directory");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.active.is_some()
    }

    pub fn watched_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Access events are produced by our own reads of the directory.
fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Access(_) => false,
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => false,
        EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
            true
        },
        EventKind::Other => true,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        notify_debouncer_full::notify::event::{AccessKind, CreateKind, RemoveKind},
        std::sync::mpsc,
    };

    const DEBOUNCE: Duration = Duration::from_millis(100);

    #[test]
    fn relevant_event_kinds() {
        assert!(is_relevant(&EventKind::Create(CreateKind::Folder)));
        assert!(is_relevant(&EventKind::Remove(RemoveKind::Folder)));
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_relevant(&EventKind::Access(AccessKind::Any)));
        assert!(!is_relevant(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::AccessTime
        ))));
    }

    #[test]
    fn watcher_detects_new_subdirectory() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();

        let mut watcher = DirectoryWatcher::new();
        watcher
            .start(tmp.path(), DEBOUNCE, move || {
                let _ = tx.send(());
            })
            .unwrap();
        assert!(watcher.is_watching());
        assert_eq!(watcher.watched_path(), Some(tmp.path()));

        std::fs::create_dir(tmp.path().join("new-project")).unwrap();

        rx.recv_timeout(Duration::from_secs(10))
            .expect("timed out waiting for watcher callback");
    }

    #[test]
    fn missing_directory_is_watch_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("gone");

        let mut watcher = DirectoryWatcher::new();
        let err = watcher.start(&missing, DEBOUNCE, || {}).unwrap_err();
        assert!(matches!(err, Error::WatchUnavailable { ref path, .. } if *path == missing));
        assert!(!watcher.is_watching());
    }

    #[test]
    fn stop_is_idempotent_and_silences_callbacks() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();

        let mut watcher = DirectoryWatcher::new();
        watcher
            .start(tmp.path(), DEBOUNCE, move || {
                let _ = tx.send(());
            })
            .unwrap();

        watcher.stop();
        watcher.stop();
        assert!(!watcher.is_watching());
        assert!(watcher.watched_path().is_none());

        std::fs::create_dir(tmp.path().join("after-stop")).unwrap();
        // The callback (and its sender) went away with the subscription.
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn restart_replaces_subscription() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        let mut watcher = DirectoryWatcher::new();
        watcher.start(first.path(), DEBOUNCE, || {}).unwrap();
        watcher.start(second.path(), DEBOUNCE, || {}).unwrap();
        assert_eq!(watcher.watched_path(), Some(second.path()));
    }
}
