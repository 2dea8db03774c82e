//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/deskmirror/config.toml` and then
//! overlaid with environment variables (see [`Config::apply_env`]).
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/deskmirror/` (~/.config/deskmirror/)
//! - Data: `$XDG_DATA_HOME/deskmirror/` (~/.local/share/deskmirror/)
//! - State/Logs: `$XDG_STATE_HOME/deskmirror/` (~/.local/state/deskmirror/)

use crate::error::{Error, Result};
use crate::intents::CoverageOptions;
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Chatwoot API credentials
    #[serde(default)]
    pub chatwoot: ChatwootConfig,

    /// Rasa NLU endpoint
    #[serde(default)]
    pub rasa: RasaConfig,

    /// Intent coverage defaults
    #[serde(default)]
    pub intents: IntentsConfig,

    /// Mirror sync settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Problems found while applying env overrides in [`Config::load`].
    /// Loading runs before logging exists, so callers report these once it does.
    #[serde(skip)]
    pub env_warnings: Vec<String>,
}

/// Chatwoot API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ChatwootConfig {
    /// Instance URL (e.g., `https://app.chatwoot.com`)
    pub base_url: Option<String>,

    /// Account whose data is mirrored
    pub account_id: Option<String>,

    /// Value for the `api_access_token` header
    pub api_token: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_chatwoot_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_chatwoot_max_retries")]
    pub max_retries: usize,

    /// Page size hint sent to list endpoints
    pub per_page: Option<u32>,
}

impl Default for ChatwootConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            account_id: None,
            api_token: None,
            timeout_secs: default_chatwoot_timeout(),
            max_retries: default_chatwoot_max_retries(),
            per_page: None,
        }
    }
}

impl ChatwootConfig {
    /// Check if every credential needed to talk to the API is present
    pub fn is_ready(&self) -> bool {
        self.base_url.is_some() && self.account_id.is_some() && self.api_token.is_some()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_none() {
            return Err(Error::Config(
                "chatwoot.base_url is required (or CHATWOOT_BASE_URL)".to_string(),
            ));
        }
        if self.account_id.is_none() {
            return Err(Error::Config(
                "chatwoot.account_id is required (or CHATWOOT_ACCOUNT_ID)".to_string(),
            ));
        }
        if self.api_token.is_none() {
            return Err(Error::Config(
                "chatwoot.api_token is required (or CHATWOOT_API_ACCESS_TOKEN)".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_chatwoot_timeout() -> u64 {
    8
}

fn default_chatwoot_max_retries() -> usize {
    3
}

/// Rasa NLU configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RasaConfig {
    /// Full URL of the `/model/parse` endpoint
    #[serde(default = "default_rasa_parse_url")]
    pub parse_url: String,

    /// Timeout in seconds for each parse request
    #[serde(default = "default_rasa_timeout")]
    pub timeout_secs: f64,

    /// Timeout in seconds for the connectivity check
    #[serde(default = "default_rasa_preflight_timeout")]
    pub preflight_timeout_secs: f64,
}

impl Default for RasaConfig {
    fn default() -> Self {
        Self {
            parse_url: default_rasa_parse_url(),
            timeout_secs: default_rasa_timeout(),
            preflight_timeout_secs: default_rasa_preflight_timeout(),
        }
    }
}

fn default_rasa_parse_url() -> String {
    "http://localhost:5005/model/parse".to_string()
}

fn default_rasa_timeout() -> f64 {
    10.0
}

fn default_rasa_preflight_timeout() -> f64 {
    2.0
}

/// Intent coverage configuration
///
/// Counts are signed so that a hand-edited negative value is clamped rather
/// than rejected when converted with [`IntentsConfig::coverage_options`].
#[derive(Debug, Deserialize, Clone)]
pub struct IntentsConfig {
    /// Path to the Rasa `nlu.yml` listing training intents
    pub nlu_file: Option<PathBuf>,

    /// Minimum observations for an intent to count as covered
    #[serde(default = "default_min_count")]
    pub min_count: i64,

    /// Debug progress every N named predictions (0 disables)
    #[serde(default = "default_progress_every")]
    pub progress_every: i64,

    /// Info progress every N scanned messages with text (0 disables)
    #[serde(default = "default_scan_progress_every")]
    pub scan_progress_every: i64,
}

impl Default for IntentsConfig {
    fn default() -> Self {
        Self {
            nlu_file: None,
            min_count: default_min_count(),
            progress_every: default_progress_every(),
            scan_progress_every: default_scan_progress_every(),
        }
    }
}

impl IntentsConfig {
    /// Configured NLU file, or `nlu.yml` next to the config file.
    pub fn nlu_path(&self) -> PathBuf {
        self.nlu_file
            .clone()
            .unwrap_or_else(|| xdg_config_home().join("deskmirror").join("nlu.yml"))
    }

    /// Build aggregator options, clamping negative values to zero.
    pub fn coverage_options(&self, sample_limit: i64) -> CoverageOptions {
        CoverageOptions {
            min_count: clamp_non_negative(self.min_count),
            progress_every: clamp_non_negative(self.progress_every),
            scan_progress_every: clamp_non_negative(self.scan_progress_every),
            sample_limit: clamp_non_negative(sample_limit),
        }
    }
}

fn default_min_count() -> i64 {
    5
}

fn default_progress_every() -> i64 {
    200
}

fn default_scan_progress_every() -> i64 {
    5000
}

/// Clamp a signed count to the `usize` range with a floor of zero.
pub fn clamp_non_negative(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

/// Mirror sync configuration
#[derive(Debug, Deserialize)]
pub struct SyncConfig {
    /// Seconds between sync passes in watch mode
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_secs: default_poll_secs(),
        }
    }
}

fn default_poll_secs() -> u64 {
    300
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path, then apply env overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        config.env_warnings = config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Overlay values from environment variables read through `lookup`.
    ///
    /// Returns one message per variable that was present but ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("CHATWOOT_BASE_URL") {
            self.chatwoot.base_url = Some(v);
        }
        if let Some(v) = non_empty("CHATWOOT_ACCOUNT_ID") {
            self.chatwoot.account_id = Some(v);
        }
        if let Some(v) = non_empty("CHATWOOT_API_ACCESS_TOKEN") {
            self.chatwoot.api_token = Some(v);
        }

        if let Some(v) = non_empty("RASA_PARSE_URL") {
            self.rasa.parse_url = v;
        } else if let Some(base) = non_empty("RASA_BASE_URL") {
            self.rasa.parse_url = format!("{}/model/parse", base.trim_end_matches('/'));
        }

        if let Some(v) = non_empty("INTENT_NLU_FILE") {
            self.intents.nlu_file = Some(PathBuf::from(v));
        }

        for (name, slot) in [
            ("INTENT_MIN_COUNT", &mut self.intents.min_count),
            ("INTENT_PROGRESS_EVERY", &mut self.intents.progress_every),
            (
                "INTENT_SCAN_PROGRESS_EVERY",
                &mut self.intents.scan_progress_every,
            ),
        ] {
            let Some(raw) = non_empty(name) else {
                continue;
            };
            match raw.trim().parse::<i64>() {
                Ok(value) => *slot = value.max(0),
                Err(_) => warnings.push(format!(
                    "{}={:?} is not an integer, keeping {}",
                    name, raw, *slot
                )),
            }
        }

        warnings
    }

    /// Send [`Config::env_warnings`] to the log and to stderr.
    pub fn report_env_warnings(&self) {
        for warning in &self.env_warnings {
            tracing::warn!(%warning, "Ignored environment override");
            eprintln!("Warning: {}", warning);
        }
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/deskmirror/config.toml` (~/.config/deskmirror/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("deskmirror").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/deskmirror/` (~/.local/share/deskmirror/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("deskmirror")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/deskmirror/` (~/.local/state/deskmirror/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("deskmirror")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/deskmirror/data.db` (~/.local/share/deskmirror/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("deskmirror.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
