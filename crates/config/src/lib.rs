//! Configuration loading for paraman.
//!
//! Config files: `paraman.toml`, `paraman.yaml`, or `paraman.json`
//! Searched in `./` then `~/.config/paraman/`.

pub mod loader;
pub mod schema;

pub use {
    loader::{
        config_dir, discover_and_load, find_or_default_config_path, load_config, save_config,
        set_config_dir, settings_path,
    },
    schema::{ParamanConfig, StorageConfig, WatcherConfig},
};
