use std::{path::PathBuf, sync::Arc};

/// An immediate child directory of the watched directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubdirectoryEntry {
    /// Absolute path. This is the entry's identity.
    pub path: PathBuf,
    /// Last path component, lossily decoded for display.
    pub name: String,
}

impl SubdirectoryEntry {
    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        Self { path, name }
    }
}

/// Signals emitted by the project model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// The cached listing was recomputed. Re-read it with `current_listing()`.
    ListingChanged,
    /// A subdirectory was moved into the archive destination.
    ArchiveCompleted {
        source: PathBuf,
        destination: PathBuf,
    },
    /// The watched directory could not be subscribed to; only manual
    /// refreshes will update the listing.
    WatchUnavailable { path: PathBuf },
}

/// Read-only view of the model state, published after every change.
#[derive(Debug, Clone, Default)]
pub struct ModelSnapshot {
    pub watched_directory: Option<PathBuf>,
    pub archive_destination: Option<PathBuf>,
    pub listing: Arc<[SubdirectoryEntry]>,
    pub watching: bool,
}
