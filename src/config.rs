//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\catalog-audit\config.toml
//! - macOS: ~/Library/Application Support/catalog-audit/config.toml
//! - Linux: ~/.config/catalog-audit/config.toml
//!
//! The config is loaded once at startup and handed to each component.
//! Nothing reads it from global state afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local library and scan settings
    pub library: LibraryConfig,

    /// External catalog connection
    pub catalog: CatalogConfig,

    /// Browse server settings
    pub server: ServerConfig,
}

/// Local library settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Local SQLite store
    pub database: PathBuf,

    /// Default scan roots, used when `scan` is given no path
    pub roots: Vec<PathBuf>,

    /// Extensions (lower-case, no dot) treated as audio files
    pub valid_extensions: Vec<String>,

    /// Subset of `valid_extensions` whose containers carry embedded tags
    pub tag_bearing_extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DB_NAME),
            roots: Vec::new(),
            valid_extensions: ["flac", "mp3", "aac", "ac3", "dts", "wav", "m4a", "wma"]
                .into_iter()
                .map(String::from)
                .collect(),
            tag_bearing_extensions: ["mp3", "flac", "m4a", "wma"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl LibraryConfig {
    /// Lower-cased extension of `path`, if it is one of `valid_extensions`.
    pub fn audio_extension(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.valid_extensions
            .iter()
            .any(|valid| valid.eq_ignore_ascii_case(&ext))
            .then_some(ext)
    }

    /// Check if a path has a recognized audio extension (case-insensitive)
    pub fn is_audio_file(&self, path: &Path) -> bool {
        self.audio_extension(path).is_some()
    }

    /// Check if an extension belongs to a tag-bearing container
    pub fn is_tag_bearing(&self, ext: &str) -> bool {
        self.tag_bearing_extensions
            .iter()
            .any(|tagged| tagged.eq_ignore_ascii_case(ext))
    }
}

/// External catalog connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// sqlx connection URL, e.g. `mysql://localhost/catalog` or `sqlite:catalog.db`
    pub url: Option<String>,

    /// Username spliced into the URL when it carries none
    pub username: Option<String>,

    /// Password spliced into the URL when it carries none
    pub password: Option<String>,
}

impl CatalogConfig {
    /// Connection URL with credentials applied.
    ///
    /// Credentials are only inserted into `scheme://host...` URLs that do not
    /// already contain a `user@` part.
    pub fn connection_url(&self) -> Option<String> {
        let url = self.url.as_deref()?;
        let Some(username) = self.username.as_deref() else {
            return Some(url.to_string());
        };
        let Some((scheme, rest)) = url.split_once("://") else {
            return Some(url.to_string());
        };
        let authority = rest.split('/').next().unwrap_or_default();
        if authority.contains('@') {
            return Some(url.to_string());
        }
        let credentials = match self.password.as_deref() {
            Some(password) => format!("{username}:{password}"),
            None => username.to_string(),
        };
        Some(format!("{scheme}://{credentials}@{rest}"))
    }
}

/// Browse server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Default local database filename.
pub const DEFAULT_DB_NAME: &str = "catalog_audit.db";

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("catalog-audit"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location
///
/// Returns default config if the file doesn't exist or can't be parsed.
pub fn load() -> Config {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            tracing::warn!("Could not determine config directory, using defaults");
            Config::default()
        }
    }
}

/// Load configuration from an explicit path
///
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to the default location
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)?;
    Ok(path)
}

/// Save configuration to `path`
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
