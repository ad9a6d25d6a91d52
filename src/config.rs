use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_PATH_VAR: &str = "NOWPLAYING_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub plex: PlexConfig,
    pub history: HistoryConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
    pub cover: CoverConfig,
}

/// Plex account and directory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlexConfig {
    /// Default credential when a request does not carry one
    pub token: Option<String>,
    /// Sent as X-Plex-Client-Identifier
    pub client_identifier: String,
    /// Base URL of the resource directory and account services
    pub directory_url: String,
    pub discovery_timeout_secs: u64,
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            token: None,
            client_identifier: "nowplaying".to_string(),
            directory_url: "https://plex.tv".to_string(),
            discovery_timeout_secs: 10,
        }
    }
}

/// Session and history fetching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of history entries kept per fetch
    pub limit: usize,
    /// Per-request timeout against the media server
    pub request_timeout_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: 25,
            request_timeout_secs: 8,
        }
    }
}

/// History cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    /// Shared Redis tier; in-process only when unset
    pub redis_url: Option<String>,
    /// Namespace for Redis keys
    pub key_prefix: String,
    /// Bound on each Redis command
    pub store_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 60,
            redis_url: None,
            key_prefix: "nowplaying:".to_string(),
            store_timeout_ms: 500,
        }
    }
}

/// HTTP server and card defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// "normal", "dark", "transparent-dark", "transparent-light", "bars"
    pub default_theme: String,
    pub image_width: u32,
    pub image_height: u32,
    /// Without an explicit `offset`, the history pick advances every
    /// `rotation_period_secs` through the newest `rotation_window` items
    pub rotation_period_secs: u64,
    pub rotation_window: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            default_theme: "normal".to_string(),
            image_width: 400,
            image_height: 90,
            rotation_period_secs: 30,
            rotation_window: 5,
        }
    }
}

/// Cover art inlining
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Covers are downscaled to fit this square
    pub max_dimension: u32,
    /// Number of inlined covers kept in memory
    pub cache_entries: usize,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            max_dimension: 160,
            cache_entries: 64,
        }
    }
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            return Ok(PathBuf::from(path));
        }
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("nowplaying");
        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from file (defaults when absent), then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Ok(path) if path.exists() => Self::load_from(&path)?,
            _ => Config::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Override settings from environment variables
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = var("PLEX_TOKEN").filter(|t| !t.is_empty()) {
            self.plex.token = Some(token);
        }
        if let Some(id) = var("PLEX_CLIENT_ID") {
            self.plex.client_identifier = id;
        }
        if let Some(url) = var("REDIS_URL").filter(|u| !u.is_empty()) {
            self.cache.redis_url = Some(url);
        }
        if let Some(ttl) = var("HISTORY_CACHE_TTL") {
            self.cache.ttl_seconds = ttl.parse().context("HISTORY_CACHE_TTL must be a number of seconds")?;
        }
        if let Some(limit) = var("HISTORY_LIMIT") {
            self.history.limit = limit.parse().context("HISTORY_LIMIT must be a number")?;
        }
        if let Some(timeout) = var("REQUEST_TIMEOUT") {
            self.history.request_timeout_secs =
                timeout.parse().context("REQUEST_TIMEOUT must be a number of seconds")?;
        }
        if let Some(port) = var("PORT") {
            self.server.port = port.parse().context("PORT must be a port number")?;
        }
        if let Some(theme) = var("DEFAULT_THEME") {
            self.server.default_theme = theme;
        }
        if let Some(width) = var("IMAGE_WIDTH") {
            self.server.image_width = width.parse().context("IMAGE_WIDTH must be a number")?;
        }
        Ok(())
    }

    /// Generate example config content for documentation
    pub fn example_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
