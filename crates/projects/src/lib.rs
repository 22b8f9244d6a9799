//! Project tracking for paraman.
//!
//! A single watched directory holds one subdirectory per project. The
//! [`ProjectModel`] keeps a sorted listing of those subdirectories current
//! through a filesystem watcher, remembers the watched directory and the
//! archive destination across restarts, and moves finished projects into
//! the archive.

mod archive;
pub mod error;
pub mod listing;
pub mod model;
pub mod store;
pub mod types;
pub mod watcher;

pub use {
    error::{Error, Result},
    listing::list_subdirectories,
    model::{ModelConfig, ProjectModel},
    store::{MemorySettingsStore, PathKey, PathStore, SettingsStore, TomlSettingsStore},
    types::{ModelEvent, ModelSnapshot, SubdirectoryEntry},
    watcher::DirectoryWatcher,
};
