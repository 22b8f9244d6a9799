use std::sync::Arc;

use {
    paraman_config::ParamanConfig,
    paraman_projects::{ModelConfig, PathStore, ProjectModel, TomlSettingsStore},
    tracing::debug,
};

/// Everything a command needs, built once at startup.
pub struct AppContext {
    pub model: ProjectModel,
}

impl AppContext {
    /// Open the settings store, start the project model, and restore the
    /// remembered directories.
    pub async fn bootstrap(config: &ParamanConfig) -> anyhow::Result<Self> {
        let settings_file = paraman_config::settings_path(config);
        debug!(path = %settings_file.display(), "using settings file");

        let store = Arc::new(TomlSettingsStore::new(settings_file));
        let model = ProjectModel::spawn(PathStore::new(store), ModelConfig {
            debounce: config.watcher.debounce(),
        });
        model.initialize().await?;

        Ok(Self { model })
    }

    pub async fn shutdown(self) {
        self.model.shutdown().await;
    }
}
