use std::path::PathBuf;

use notify_debouncer_full::notify;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read directory {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot watch {path}: {source}")]
    WatchUnavailable {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("archive destination is not selected")]
    ArchiveDestinationNotSet,
    #[error("no entry at index {index} (listing has {len})")]
    InvalidIndex { index: usize, len: usize },
    #[error("'{name}' already exists in the archive destination")]
    DestinationAlreadyExists { name: String },
    #[error("failed to move {source_path} to {destination}: {source}")]
    MoveFailed {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8 and cannot be stored")]
    NonUtf8Path { path: PathBuf },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    TomlDeserialize(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("project model has shut down")]
    ModelClosed,
}

impl Error {
    #[must_use]
    pub fn directory_unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryUnreadable {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn move_failed(
        source_path: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::MoveFailed {
            source_path: source_path.into(),
            destination: destination.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
