use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use {async_trait::async_trait, tokio::sync::Mutex, tracing::info};

use crate::error::{Error, Result};

/// Durable string key-value storage for application settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

// ── TOML file-backed implementation ──────────────────────────────────

#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
struct TomlFile {
    #[serde(default)]
    settings: BTreeMap<String, String>,
}

/// Stores settings in a TOML file at the given path.
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<TomlFile> {
        if self.path.exists() {
            let data = fs::read_to_string(&self.path)?;
            Ok(toml::from_str(&data)?)
        } else {
            Ok(TomlFile::default())
        }
    }

    fn write_file(&self, file: &TomlFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(file)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for TomlSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_file()?.settings.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut file = self.read_file()?;
        file.settings.insert(key.to_string(), value.to_string());
        self.write_file(&file)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut file = self.read_file()?;
        if file.settings.remove(key).is_some() {
            self.write_file(&file)?;
        }
        Ok(())
    }
}

// ── In-memory implementation ────────────────────────────────────────

/// Keeps settings in memory only. Nothing survives the process.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

// ── Directory paths ─────────────────────────────────────────────────

/// The two directories the application remembers across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKey {
    WatchedDirectory,
    ArchiveDestination,
}

impl PathKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WatchedDirectory => "watched_directory",
            Self::ArchiveDestination => "archive_destination",
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persists the watched directory and archive destination in a
/// [`SettingsStore`].
#[derive(Clone)]
pub struct PathStore {
    store: Arc<dyn SettingsStore>,
}

impl PathStore {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// A store that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySettingsStore::new()))
    }

    /// Load the path saved under `key`.
    ///
    /// Returns `None` when nothing was saved, or when the saved path no
    /// longer exists. In the latter case the stale value is removed.
    pub async fn load(&self, key: PathKey) -> Result<Option<PathBuf>> {
        let Some(raw) = self.store.get(key.as_str()).await? else {
            return Ok(None);
        };
        let path = PathBuf::from(raw);
        if path.exists() {
            return Ok(Some(path));
        }
        info!(key = %key, path = %path.display(), "stored directory no longer exists, forgetting it");
        self.store.remove(key.as_str()).await?;
        Ok(None)
    }

    pub async fn save(&self, key: PathKey, path: &Path) -> Result<()> {
        let value = path.to_str().ok_or_else(|| Error::NonUtf8Path {
            path: path.to_path_buf(),
        })?;
        self.store.set(key.as_str(), value).await
    }

    pub async fn clear(&self, key: PathKey) -> Result<()> {
        self.store.remove(key.as_str()).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_toml_store_crud() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlSettingsStore::new(dir.path().join("settings.toml"));

        // Empty initially, and the file is not created by reads
        assert!(store.get("a").await.unwrap().is_none());
        assert!(!store.path().exists());

        store.set("a", "/one").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("/one"));

        // Overwrite
        store.set("a", "/two").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("/two"));

        store.remove("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());

        // Removing an absent key is fine
        store.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_toml_store_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        {
            let store = TomlSettingsStore::new(path.clone());
            store.set("watched_directory", "/projects").await.unwrap();
        }

        // New store instance reads from disk
        let store = TomlSettingsStore::new(path);
        assert_eq!(
            store.get("watched_directory").await.unwrap().as_deref(),
            Some("/projects")
        );
    }

    #[tokio::test]
    async fn test_toml_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "settings = [not toml").unwrap();

        let store = TomlSettingsStore::new(path);
        assert!(matches!(
            store.get("a").await,
            Err(Error::TomlDeserialize(_))
        ));
    }

    #[tokio::test]
    async fn test_path_store_missing_key_is_none() {
        let paths = PathStore::in_memory();
        assert!(paths.load(PathKey::WatchedDirectory).await.unwrap().is_none());
        assert!(paths.load(PathKey::ArchiveDestination).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_path_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathStore::in_memory();

        paths
            .save(PathKey::ArchiveDestination, dir.path())
            .await
            .unwrap();
        assert_eq!(
            paths.load(PathKey::ArchiveDestination).await.unwrap(),
            Some(dir.path().to_path_buf())
        );
        // Keys are independent
        assert!(paths.load(PathKey::WatchedDirectory).await.unwrap().is_none());

        paths.clear(PathKey::ArchiveDestination).await.unwrap();
        assert!(paths.load(PathKey::ArchiveDestination).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_path_store_prunes_stale_paths() {
        let dir = tempfile::tempdir().unwrap();
        let projects = dir.path().join("projects");
        fs::create_dir(&projects).unwrap();

        let settings = Arc::new(MemorySettingsStore::new());
        let paths = PathStore::new(settings.clone());
        paths
            .save(PathKey::WatchedDirectory, &projects)
            .await
            .unwrap();

        fs::remove_dir(&projects).unwrap();

        assert!(paths.load(PathKey::WatchedDirectory).await.unwrap().is_none());
        // The stale entry is gone from the underlying store too
        assert!(settings.get("watched_directory").await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_path_store_rejects_non_utf8() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let paths = PathStore::in_memory();
        let path = Path::new(OsStr::from_bytes(b"/tmp/\xff"));
        assert!(matches!(
            paths.save(PathKey::WatchedDirectory, path).await,
            Err(Error::NonUtf8Path { .. })
        ));
    }
}
