use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use caresync_core::{MutationType, RefreshSources};

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL (e.g., "https://api.caresync.example")
    pub base_url: Option<String>,
    /// Bearer token sent with every request
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Path probed to decide whether the backend is reachable
    pub health_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: 10,
            health_path: "/api/health".to_string(),
        }
    }
}

impl ApiConfig {
    /// Returns true if a backend URL is set
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

/// Storage accounting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub capacity_bytes: u64,
    /// Usage percentage at which a warning is shown
    pub warn_percent: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: caresync_core::accountant::DEFAULT_CAPACITY_BYTES,
            warn_percent: caresync_core::accountant::DEFAULT_WARN_PERCENT,
        }
    }
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Drain the queue after write commands (default: false)
    pub auto_sync: bool,
    /// Seconds between reachability checks in `watch`
    pub poll_interval_secs: u64,
    /// Drain lease length in seconds; 0 disables the lease
    pub lease_ttl_secs: u64,
    /// Per-type endpoint overrides
    pub endpoints: HashMap<MutationType, String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: false,
            poll_interval_secs: 30,
            lease_ttl_secs: 120,
            endpoints: HashMap::new(),
        }
    }
}

/// Read endpoints for the reference data cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub pharmacies: String,
    pub doctors: String,
    pub user_profile: String,
    pub emergency_contacts: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let sources = RefreshSources::default();
        Self {
            pharmacies: sources.pharmacies,
            doctors: sources.doctors,
            user_profile: sources.user_profile,
            emergency_contacts: sources.emergency_contacts,
        }
    }
}

impl From<&CacheConfig> for RefreshSources {
    fn from(cache: &CacheConfig) -> Self {
        RefreshSources {
            pharmacies: cache.pharmacies.clone(),
            doctors: cache.doctors.clone(),
            user_profile: cache.user_profile.clone(),
            emergency_contacts: cache.emergency_contacts.clone(),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the offline store
    pub data_dir: ConfigValue<PathBuf>,
    /// Prefix for every stored key
    pub namespace: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    namespace: Option<String>,
    api: Option<ApiConfig>,
    storage: Option<StorageConfig>,
    sync: Option<SyncConfig>,
    cache: Option<CacheConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut namespace = ConfigValue::new("caresync".to_string(), ConfigSource::Default);
        let mut config_file = None;
        let mut api = ApiConfig::default();
        let mut storage = StorageConfig::default();
        let mut sync = SyncConfig::default();
        let mut cache = CacheConfig::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(name) = file_config.namespace {
                namespace = ConfigValue::new(name, ConfigSource::File);
            }
            if let Some(api_config) = file_config.api {
                api = api_config;
            }
            if let Some(storage_config) = file_config.storage {
                storage = storage_config;
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
            if let Some(cache_config) = file_config.cache {
                cache = cache_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(dir) = std::env::var("CARESYNC_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("CARESYNC_API_URL") {
            api.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("CARESYNC_API_KEY") {
            api.api_key = Some(key);
        }

        Ok(Self {
            data_dir,
            namespace,
            config_file,
            api,
            storage,
            sync,
            cache,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/caresync/
    /// - macOS: ~/Library/Application Support/caresync/
    /// - Windows: %APPDATA%/caresync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("caresync")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/caresync/
    /// - macOS: ~/Library/Application Support/caresync/
    /// - Windows: %APPDATA%/caresync/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("caresync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }

    /// Starter config file written by `config init`
    pub fn template() -> &'static str {
        r#"# CareSync configuration

# data_dir: ~/.local/share/caresync
# namespace: caresync

api:
  base_url: "http://localhost:3000"
  # api_key: "your-api-key"
  timeout_secs: 10
  health_path: /api/health

storage:
  capacity_bytes: 5242880
  warn_percent: 80

sync:
  auto_sync: false
  poll_interval_secs: 30
  lease_ttl_secs: 120
  # endpoints:
  #   document: /api/medical-records/upload

# cache:
#   pharmacies: /api/pharmacies
#   doctors: /api/doctors
#   user_profile: /api/users/me
#   emergency_contacts: /api/emergency-contacts
"#
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
