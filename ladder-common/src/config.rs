//! Configuration loading and resolution
//!
//! Configuration is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is never fatal: the tracker logs a warning and runs
//! with compiled defaults. An explicitly named file that cannot be read is.

use crate::models::CategoryVocabulary;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "LADDER_TRACKER_CONFIG";
/// Environment variable holding the bearer token for deep (authenticated) mode
pub const ACCESS_TOKEN_ENV_VAR: &str = "LADDER_TRACKER_ACCESS_TOKEN";
/// Environment variable overriding the log level
pub const LOG_LEVEL_ENV_VAR: &str = "LADDER_TRACKER_LOG";

const CONFIG_DIR_NAME: &str = "ladder-tracker";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Complete TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub api: ApiSettings,
    pub scan: ScanSettings,
    pub race: RaceSettings,
    pub logging: LoggingConfig,
    /// Additional category vocabularies, consulted before the built-in ones
    #[serde(rename = "vocabulary", skip_serializing_if = "Vec::is_empty")]
    pub vocabularies: Vec<CategoryVocabulary>,
}

/// Ladder API endpoints and client behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the public (unauthenticated) API
    pub public_base_url: String,
    /// Base URL of the authenticated API used for deep scans
    pub authenticated_base_url: String,
    /// Contact address embedded in the User-Agent
    pub contact: String,
    /// Bearer token for the authenticated API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Client-side request quota
    pub requests_per_second: u32,
    pub request_timeout_secs: u64,
    /// Retries after HTTP 429 before giving up
    pub max_rate_limit_retries: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            public_base_url: "https://www.pathofexile.com/api".to_string(),
            authenticated_base_url: "https://api.pathofexile.com".to_string(),
            contact: "ladder-tracker@example.com".to_string(),
            access_token: None,
            requests_per_second: 2,
            request_timeout_secs: 30,
            max_rate_limit_retries: 3,
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// User-Agent sent with every request
    pub fn user_agent(&self) -> String {
        format!(
            "ladder-tracker/{} (contact: {})",
            env!("CARGO_PKG_VERSION"),
            self.contact
        )
    }
}

/// Pagination and stopping parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Entries per page request
    pub page_size: u32,
    /// Delay between consecutive page fetches
    pub page_interval_ms: u64,
    /// Offset at which public-mode traversal stops
    pub public_depth_ceiling: u32,
    /// Optional ceiling for authenticated traversal (none by default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_depth_ceiling: Option<u32>,
    /// Per-category limit of a fresh fetch
    pub initial_limit: usize,
    /// Amount added to the limit by "show more"
    pub show_more_step: usize,
    /// Wall-clock budget of a character search (0 disables)
    pub search_timeout_secs: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            page_size: 200,
            page_interval_ms: 500,
            public_depth_ceiling: 15_000,
            deep_depth_ceiling: None,
            initial_limit: 10,
            show_more_step: 50,
            search_timeout_secs: 120,
        }
    }
}

impl ScanSettings {
    pub fn page_interval(&self) -> Duration {
        Duration::from_millis(self.page_interval_ms)
    }

    pub fn search_timeout(&self) -> Option<Duration> {
        (self.search_timeout_secs > 0).then(|| Duration::from_secs(self.search_timeout_secs))
    }
}

/// Race (neighbor comparison) parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceSettings {
    /// Number of entries fetched around the tracked character
    pub window_size: u32,
    pub refresh_interval_secs: u64,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            window_size: 200,
            refresh_interval_secs: 60,
        }
    }
}

impl RaceSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from a path found by [`resolve_config_path`]
    ///
    /// `None` means no file was found and compiled defaults apply.
    /// Environment overrides are applied on top of either.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(path)?
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                TomlConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (tier 2)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                debug!("Access token loaded from environment variable");
                self.api.access_token = Some(token);
            }
        }

        if let Ok(level) = std::env::var(LOG_LEVEL_ENV_VAR) {
            if !level.trim().is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Reject values the scan engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.scan.page_size == 0 {
            return Err(Error::Config("scan.page_size must be greater than zero".to_string()));
        }
        if self.scan.initial_limit == 0 {
            return Err(Error::Config("scan.initial_limit must be greater than zero".to_string()));
        }
        if self.api.requests_per_second == 0 {
            return Err(Error::Config("api.requests_per_second must be greater than zero".to_string()));
        }
        if self.race.window_size == 0 {
            return Err(Error::Config("race.window_size must be greater than zero".to_string()));
        }
        for vocabulary in &self.vocabularies {
            if vocabulary.categories.is_empty() {
                return Err(Error::Config(format!(
                    "vocabulary '{}' has no categories",
                    vocabulary.name
                )));
            }
        }
        Ok(())
    }

    /// Configured vocabularies followed by the built-in ones
    pub fn all_vocabularies(&self) -> Vec<CategoryVocabulary> {
        let mut all = self.vocabularies.clone();
        all.extend(CategoryVocabulary::builtin());
        all
    }

    /// Bearer token, if one is configured and non-blank
    pub fn access_token(&self) -> Option<&str> {
        self.api
            .access_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }
}

/// Locate the config file
///
/// Returns `Ok(None)` when no tier names a file and the default location does
/// not exist. A file named by the CLI or environment must exist.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return require_existing(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return require_existing(PathBuf::from(path));
        }
    }

    // Priority 3: Default location
    Ok(default_config_path().filter(|p| p.exists()))
}

fn require_existing(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}

/// Platform config location (`~/.config/ladder-tracker/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Write a TOML config file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
