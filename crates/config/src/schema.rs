//! Config schema types.
use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamanConfig {
    pub watcher: WatcherConfig,
    pub storage: StorageConfig,
}

/// Directory watcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Milliseconds to collect filesystem events before refreshing the listing.
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { debounce_ms: 250 }
    }
}

impl WatcherConfig {
    /// The debounce window, never shorter than 10 ms.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.max(10))
    }
}

/// Where the remembered directories are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Settings file path. Defaults to `settings.toml` in the config directory.
    pub settings_file: Option<PathBuf>,
}
