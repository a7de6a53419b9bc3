//! Configuration management using the prefer crate.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::parser::UnknownDistinctionPolicy;
use crate::repository::{DieselFactStore, SqlitePool};
use crate::scrapers::FetchConfig;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "michelin.db";

/// Default cache subdirectory name.
const CACHE_SUBDIR: &str = "cache/scrape";

/// Default dataset subdirectory name.
const DATASET_SUBDIR: &str = "HistoricalData";

/// Default window, in calendar months, in which a dataset file counts as recent.
pub const DEFAULT_RECENT_WINDOW_MONTHS: u32 = 1;

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    /// Response cache directory.
    pub cache_dir: PathBuf,
    /// Directory scanned by the dataset command.
    pub dataset_dir: PathBuf,
    /// User agent configuration ("impersonate", a custom string, or None).
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Politeness profile for the guide site.
    pub crawl: FetchConfig,
    /// Politeness profile for the web archive.
    pub archive: FetchConfig,
    /// Archive index endpoint.
    pub cdx_url: String,
    /// Handling of distinction strings that match no tier.
    pub unknown_distinction: UnknownDistinctionPolicy,
    /// Dataset files dated within this many calendar months are treated as recent.
    pub recent_window_months: u32,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: platform data dir -> ./data
        let data_dir = dirs::data_dir()
            .map(|d| d.join("michelin"))
            .unwrap_or_else(|| PathBuf::from("data"));

        Self {
            cache_dir: data_dir.join(CACHE_SUBDIR),
            dataset_dir: data_dir.join(DATASET_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            user_agent: Some("impersonate".to_string()),
            request_timeout: 30,
            crawl: FetchConfig::primary_site(),
            archive: FetchConfig::archive(),
            cdx_url: crate::archive::WAYBACK_CDX_API_URL.to_string(),
            unknown_distinction: UnknownDistinctionPolicy::default(),
            recent_window_months: DEFAULT_RECENT_WINDOW_MONTHS,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            cache_dir: data_dir.join(CACHE_SUBDIR),
            dataset_dir: data_dir.join(DATASET_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (label, dir) in [("data", &self.data_dir), ("cache", &self.cache_dir)] {
            tracing::debug!("Ensuring {} directory: {}", label, dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }

    /// Open the fact store and bring its schema up to date.
    pub async fn open_store(&self) -> Result<DieselFactStore, diesel::result::Error> {
        let url = self.database_url();
        crate::repository::migrations::run_migrations(&url).await?;
        Ok(DieselFactStore::new(SqlitePool::new(&url)))
    }

    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Per-profile overrides from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct ProfileOverrides {
    /// Fixed delay between requests in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    /// Upper bound of random jitter added to the delay, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_delay_ms: Option<u64>,
    /// Retry ceiling per URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retry: Option<u64>,
    /// Maximum URLs requested per run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_urls: Option<u64>,
    /// Concurrent workers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<u64>,
}

impl ProfileOverrides {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Apply overrides on top of a base profile.
    pub fn apply(&self, profile: &mut FetchConfig) {
        if let Some(ms) = self.delay_ms {
            profile.delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.random_delay_ms {
            profile.random_delay = Duration::from_millis(ms);
        }
        if let Some(n) = self.max_retry {
            profile.max_retry = n as u32;
        }
        if let Some(n) = self.max_urls {
            profile.max_urls = n as usize;
        }
        if let Some(n) = self.workers {
            profile.workers = (n as usize).max(1);
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Response cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    /// Dataset directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_dir: Option<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Guide site profile overrides.
    #[serde(default, skip_serializing_if = "ProfileOverrides::is_default")]
    #[prefer(default)]
    pub crawl: ProfileOverrides,
    /// Web archive profile overrides.
    #[serde(default, skip_serializing_if = "ProfileOverrides::is_default")]
    #[prefer(default)]
    pub archive: ProfileOverrides,
    /// Archive index endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdx_url: Option<String>,
    /// "selected" or "skip".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown_distinction: Option<String>,
    /// Recent dataset window in calendar months.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_window_months: Option<u32>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    pub async fn load() -> Self {
        match prefer::load("michelin").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await.unwrap_or_else(|e| {
                    tracing::warn!("{}", e);
                    Self::default()
                }),
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.cache_dir = settings.data_dir.join(CACHE_SUBDIR);
            settings.dataset_dir = settings.data_dir.join(DATASET_SUBDIR);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref cache_dir) = self.cache_dir {
            settings.cache_dir = self.resolve_path(cache_dir, base_dir);
        }
        if let Some(ref dataset_dir) = self.dataset_dir {
            settings.dataset_dir = self.resolve_path(dataset_dir, base_dir);
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref cdx_url) = self.cdx_url {
            settings.cdx_url = cdx_url.clone();
        }
        if let Some(ref policy) = self.unknown_distinction {
            match UnknownDistinctionPolicy::from_str(policy) {
                Some(p) => settings.unknown_distinction = p,
                None => tracing::warn!("Ignoring unknown_distinction value: {}", policy),
            }
        }
        if let Some(months) = self.recent_window_months {
            settings.recent_window_months = months;
        }
        self.crawl.apply(&mut settings.crawl);
        self.archive.apply(&mut settings.archive);
    }

    /// Compute SHA-256 hash of the serialized config.
    pub fn hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Config::default()
        }),
        None => Config::load().await,
    };

    let mut settings = Settings::default();

    let base_dir = if options.use_cwd {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        config
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    };

    config.apply_to_settings(&mut settings, &base_dir);

    // DATABASE_URL environment variable takes highest precedence
    if let Some(database_url) = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) {
        tracing::debug!("Using DATABASE_URL from environment: {}", database_url);
        settings.database_url = Some(database_url);
    }

    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_toml_config_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("michelin.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "store"
unknown_distinction = "skip"
recent_window_months = 3

[crawl]
delay_ms = 8000
random_delay_ms = 8000
workers = 0
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, &config.base_dir().unwrap());

        assert_eq!(settings.data_dir, dir.path().join("store"));
        assert_eq!(settings.cache_dir, dir.path().join("store").join(CACHE_SUBDIR));
        assert_eq!(settings.unknown_distinction, UnknownDistinctionPolicy::Skip);
        assert_eq!(settings.recent_window_months, 3);
        assert_eq!(settings.crawl.delay, Duration::from_secs(8));
        assert_eq!(settings.crawl.workers, 1);
        assert_eq!(settings.archive.delay, FetchConfig::archive().delay);
    }

    #[tokio::test]
    async fn test_load_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("michelin.json");
        std::fs::write(&path, r#"{"database": "guide.db", "archive": {"workers": 8}}"#).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.database.as_deref(), Some("guide.db"));
        assert_eq!(config.archive.workers, Some(8));
    }

    #[test]
    fn test_database_url_from_path() {
        let settings = Settings::with_data_dir(PathBuf::from("/tmp/m"));
        assert_eq!(settings.database_url(), "sqlite:/tmp/m/michelin.db");
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = Config::default();
        let b = Config {
            recent_window_months: Some(2),
            ..Default::default()
        };
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), Config::default().hash());
    }
}
