use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, warn};

use crate::schema::ParamanConfig;

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "paraman.toml",
    "paraman.yaml",
    "paraman.yml",
    "paraman.json",
];

const SETTINGS_FILENAME: &str = "settings.toml";

static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Use `dir` instead of the platform config directory.
pub fn set_config_dir(dir: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = Some(dir);
}

#[cfg(test)]
fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = None;
}

/// Returns the config directory: the override if set, else `~/.config/paraman/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
    {
        return Some(dir);
    }
    directories::ProjectDirs::from("", "", "paraman").map(|d| d.config_dir().to_path_buf())
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<ParamanConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./paraman.{toml,yaml,yml,json}` (working directory)
/// 2. `<config dir>/paraman.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ParamanConfig::default()` if no config file is found or the
/// file cannot be parsed.
pub fn discover_and_load() -> ParamanConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ParamanConfig::default()
}

fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paraman.toml")
}

/// Where the remembered directories are stored.
pub fn settings_path(config: &ParamanConfig) -> PathBuf {
    if let Some(ref path) = config.storage.settings_file {
        return path.clone();
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SETTINGS_FILENAME)
}

/// Write `config` to the config path, in the format its extension names.
///
/// Creates parent directories if needed. Returns the path written to.
pub fn save_config(config: &ParamanConfig) -> anyhow::Result<PathBuf> {
    let path = find_or_default_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = render_config(config, &path)?;
    std::fs::write(&path, raw)?;
    debug!(path = %path.display(), "saved config");
    Ok(path)
}

fn render_config(config: &ParamanConfig, path: &Path) -> anyhow::Result<String> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))
        },
        "yaml" | "yml" => Ok(serde_yaml::to_string(config)?),
        "json" => Ok(serde_json::to_string_pretty(config)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ParamanConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration};

    #[test]
    fn parses_toml() {
        let cfg = parse_config(
            "[watcher]\ndebounce_ms = 500\n\n[storage]\nsettings_file = \"/tmp/s.toml\"\n",
            Path::new("paraman.toml"),
        )
        .unwrap();
        assert_eq!(cfg.watcher.debounce_ms, 500);
        assert_eq!(
            cfg.storage.settings_file,
            Some(PathBuf::from("/tmp/s.toml"))
        );
    }

    #[test]
    fn parses_yaml_and_json() {
        let yaml = parse_config("watcher:\n  debounce_ms: 40\n", Path::new("paraman.yml")).unwrap();
        assert_eq!(yaml.watcher.debounce_ms, 40);

        let json = parse_config(r#"{"watcher":{"debounce_ms":75}}"#, Path::new("paraman.json"))
            .unwrap();
        assert_eq!(json.watcher.debounce_ms, 75);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg = parse_config("", Path::new("paraman.toml")).unwrap();
        assert_eq!(cfg, ParamanConfig::default());
        assert_eq!(cfg.watcher.debounce(), Duration::from_millis(250));
    }

    #[test]
    fn debounce_has_a_floor() {
        let cfg = parse_config("[watcher]\ndebounce_ms = 0\n", Path::new("paraman.toml")).unwrap();
        assert_eq!(cfg.watcher.debounce(), Duration::from_millis(10));
    }

    #[test]
    fn saved_config_follows_file_extension() {
        let mut cfg = ParamanConfig::default();
        cfg.watcher.debounce_ms = 320;

        let yaml = render_config(&cfg, Path::new("paraman.yaml")).unwrap();
        assert!(yaml.contains("debounce_ms: 320"), "{yaml}");

        let json = render_config(&cfg, Path::new("paraman.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["watcher"]["debounce_ms"], 320);

        assert!(render_config(&cfg, Path::new("paraman.ini")).is_err());
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(parse_config("", Path::new("paraman.ini")).is_err());
    }

    #[test]
    fn explicit_settings_file_wins() {
        let mut cfg = ParamanConfig::default();
        cfg.storage.settings_file = Some(PathBuf::from("/srv/paraman/settings.toml"));
        assert_eq!(
            settings_path(&cfg),
            PathBuf::from("/srv/paraman/settings.toml")
        );
    }

    // Touches the process-wide override, so everything that depends on it
    // lives in this one test.
    #[test]
    fn config_dir_override_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        set_config_dir(tmp.path().to_path_buf());

        assert_eq!(config_dir(), Some(tmp.path().to_path_buf()));
        assert_eq!(
            settings_path(&ParamanConfig::default()),
            tmp.path().join("settings.toml")
        );
        assert_eq!(discover_and_load(), ParamanConfig::default());

        let mut cfg = ParamanConfig::default();
        cfg.watcher.debounce_ms = 900;
        let written = save_config(&cfg).unwrap();
        assert_eq!(written, tmp.path().join("paraman.toml"));
        assert_eq!(discover_and_load().watcher.debounce_ms, 900);

        std::fs::write(&written, "watcher = 'oops'").unwrap();
        assert_eq!(discover_and_load(), ParamanConfig::default());

        clear_config_dir();
        assert_ne!(config_dir(), Some(tmp.path().to_path_buf()));
    }
}
