//! Configuration Loading
//!
//! The feed list lives in an editable file so feeds can be added or removed
//! without rebuilding. The default location is
//! `$XDG_CONFIG_HOME/feedticker/feeds.toml`.
//!
//! # Configuration Priority
//!
//! Values are applied with the following priority (highest first):
//! 1. CLI arguments (see [`ConfigOverrides`])
//! 2. Environment variables (`TICKER_*`)
//! 3. Configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! initial_feed = 0
//!
//! [[feeds]]
//! feed_name = "BBC News - UK"
//! url = "http://feeds.bbci.co.uk/news/rss.xml?edition=uk"
//!
//! [[feeds]]
//! feed_name = "Hacker News"
//! url = "https://news.ycombinator.com/rss"
//!
//! [display]
//! cols = 16
//! rows = 2
//!
//! [timing]
//! dwell_secs = 60
//! scroll_interval_ms = 10
//! fetch_timeout_secs = 30
//!
//! [shutdown]
//! notice = "Shutdown In 5"
//! delay_secs = 5
//! poweroff = true
//! command = ["sudo", "shutdown", "-h", "now"]
//!
//! [buttons]
//! next = ["Right", "n"]
//! previous = ["Left", "p"]
//! shutdown = ["q", "Esc"]
//! ```
//!
//! A file with a `.json` extension is read as a bare JSON array of
//! `{"feed_name": ..., "url": ...}` records instead; all other settings then
//! keep their defaults. A `.txt` feed list holds the same array but is parsed
//! as JSON5, so single-quoted records such as
//! `[{'feed_name': 'BBC News - UK', 'url': '...'}]` are accepted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buttons::{ButtonError, KeyBindings};
use crate::feed::{Feed, FeedList};
use crate::shutdown::{ExitOnly, ShutdownAction, SystemShutdown, DEFAULT_DELAY, DEFAULT_NOTICE};
use crate::source::DEFAULT_FETCH_TIMEOUT;
use crate::viewer::{ViewerSettings, MAX_DWELL};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to parse a JSON feed list
    #[error("Failed to parse JSON feed list: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Failed to parse a text feed list
    #[error("Failed to parse feed list: {0}")]
    TextError(#[from] json5::Error),

    /// Invalid key binding
    #[error("Invalid button binding: {0}")]
    Buttons(#[from] ButtonError),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from the configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// File Structures
// =============================================================================

/// Display section of the configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayToml {
    /// Panel width in characters
    pub cols: Option<u16>,
    /// Panel height in rows
    pub rows: Option<u16>,
}

/// Timing section of the configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingToml {
    /// Seconds each entry stays on screen
    pub dwell_secs: Option<u64>,
    /// Milliseconds between scroll frames
    pub scroll_interval_ms: Option<u64>,
    /// Seconds before a feed fetch gives up
    pub fetch_timeout_secs: Option<u64>,
}

/// Shutdown section of the configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownToml {
    /// Text shown before powering off
    pub notice: Option<String>,
    /// Seconds between the notice and the shutdown action
    pub delay_secs: Option<u64>,
    /// Whether to power the machine off (false: just exit)
    pub poweroff: Option<bool>,
    /// Command line to run instead of the default halt command
    pub command: Option<Vec<String>>,
}

/// Button section of the configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonsToml {
    /// Key names for "next feed"
    pub next: Option<Vec<String>>,
    /// Key names for "previous feed"
    pub previous: Option<Vec<String>>,
    /// Key names for "shutdown"
    pub shutdown: Option<Vec<String>>,
}

/// Top-level configuration file structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerToml {
    /// Feeds in display order
    pub feeds: Vec<Feed>,
    /// Index of the feed shown at startup
    pub initial_feed: Option<usize>,
    /// Display section
    pub display: DisplayToml,
    /// Timing section
    pub timing: TimingToml,
    /// Shutdown section
    pub shutdown: ShutdownToml,
    /// Button section
    pub buttons: ButtonsToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Shutdown behavior
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownSettings {
    /// Text shown before the action
    pub notice: String,
    /// Delay between the notice and the action
    pub delay: Duration,
    /// Whether to power off; when false the process only exits
    pub poweroff: bool,
    /// Command replacing the default halt command
    pub command: Option<Vec<String>>,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            notice: DEFAULT_NOTICE.to_string(),
            delay: DEFAULT_DELAY,
            poweroff: true,
            command: None,
        }
    }
}

impl ShutdownSettings {
    /// Build the action to run at the end of the shutdown sequence
    ///
    /// With poweroff disabled the process just exits. Otherwise the
    /// configured command runs, falling back to halting the machine.
    #[must_use]
    pub fn action(&self) -> Box<dyn ShutdownAction> {
        if !self.poweroff {
            return Box::new(ExitOnly);
        }
        match self.command.clone().and_then(SystemShutdown::from_command) {
            Some(command) => Box::new(command),
            None => Box::new(SystemShutdown::halt()),
        }
    }
}

/// Complete ticker configuration
#[derive(Clone, Debug)]
pub struct TickerConfig {
    /// Feeds in display order
    pub feeds: Vec<Feed>,
    /// Index of the feed shown at startup
    pub initial_feed: usize,
    /// Panel height in rows (width lives in `viewer`)
    pub rows: u16,
    /// Viewer geometry and timing
    pub viewer: ViewerSettings,
    /// Timeout for each feed fetch
    pub fetch_timeout: Duration,
    /// Shutdown behavior
    pub shutdown: ShutdownSettings,
    /// Keyboard bindings for the three controls
    pub buttons: KeyBindings,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            initial_feed: 0,
            rows: 2,
            viewer: ViewerSettings::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            shutdown: ShutdownSettings::default(),
            buttons: KeyBindings::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl TickerConfig {
    /// Create a configuration with default values and no feeds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check that the configuration can drive the ticker
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one feed must be configured".to_string(),
            ));
        }
        if let Some(feed) = self.feeds.iter().find(|f| f.url().trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "feed '{}' has no url",
                feed.name()
            )));
        }
        if self.initial_feed >= self.feeds.len() {
            return Err(ConfigError::ValidationError(format!(
                "initial_feed {} out of range for {} feeds",
                self.initial_feed,
                self.feeds.len()
            )));
        }
        if self.viewer.width == 0 || self.rows == 0 {
            return Err(ConfigError::ValidationError(
                "display must be at least 1x1".to_string(),
            ));
        }
        if self.viewer.dwell.is_zero() {
            return Err(ConfigError::ValidationError(
                "dwell_secs must be positive".to_string(),
            ));
        }
        if self.viewer.dwell > MAX_DWELL {
            return Err(ConfigError::ValidationError(format!(
                "dwell_secs must be at most {}",
                MAX_DWELL.as_secs()
            )));
        }
        if self.viewer.scroll_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "scroll_interval_ms must be positive".to_string(),
            ));
        }
        if matches!(&self.shutdown.command, Some(command) if command.is_empty()) {
            return Err(ConfigError::ValidationError(
                "shutdown command must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validated feed list
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if no feeds are configured.
    pub fn feed_list(&self) -> Result<FeedList, ConfigError> {
        FeedList::new(self.feeds.clone()).ok_or_else(|| {
            ConfigError::ValidationError("at least one feed must be configured".to_string())
        })
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/feedticker/feeds.toml` or
/// `~/.config/feedticker/feeds.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("feedticker").join("feeds.toml"))
}

/// Load configuration from the default path and the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
pub fn load_config() -> Result<TickerConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path and the environment
///
/// A missing file is not an error here; [`TickerConfig::validate`] will
/// report the missing feeds.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<TickerConfig, ConfigError> {
    let mut config = TickerConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let file_config = parse_config_file(config_path, &content)?;
            apply_file_config(&mut config, &file_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                feeds = config.feeds.len(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Parse file contents according to the file's extension
fn parse_config_file(path: &Path, content: &str) -> Result<TickerToml, ConfigError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let feeds: Vec<Feed> = match extension.as_deref() {
        Some("json") => serde_json::from_str(content)?,
        Some("txt") => json5::from_str(content)?,
        _ => return Ok(toml::from_str(content)?),
    };
    Ok(TickerToml {
        feeds,
        ..TickerToml::default()
    })
}

/// Apply file values to the config struct
fn apply_file_config(config: &mut TickerConfig, file: &TickerToml) -> Result<(), ConfigError> {
    config.feeds = file.feeds.clone();
    if let Some(index) = file.initial_feed {
        config.initial_feed = index;
    }

    // Display settings
    if let Some(cols) = file.display.cols {
        config.viewer.width = usize::from(cols);
    }
    if let Some(rows) = file.display.rows {
        config.rows = rows;
    }

    // Timing settings
    if let Some(secs) = file.timing.dwell_secs {
        config.viewer.dwell = Duration::from_secs(secs);
    }
    if let Some(ms) = file.timing.scroll_interval_ms {
        config.viewer.scroll_interval = Duration::from_millis(ms);
    }
    if let Some(secs) = file.timing.fetch_timeout_secs {
        config.fetch_timeout = Duration::from_secs(secs);
    }

    // Shutdown settings
    if let Some(ref notice) = file.shutdown.notice {
        config.shutdown.notice = notice.clone();
    }
    if let Some(secs) = file.shutdown.delay_secs {
        config.shutdown.delay = Duration::from_secs(secs);
    }
    if let Some(poweroff) = file.shutdown.poweroff {
        config.shutdown.poweroff = poweroff;
    }
    if file.shutdown.command.is_some() {
        config.shutdown.command = file.shutdown.command.clone();
    }

    // Button settings
    let defaults = KeyBindings::default();
    if let Some(ref names) = file.buttons.next {
        config.buttons.next = KeyBindings::from_names(names, &[], &[])?.next;
    }
    if let Some(ref names) = file.buttons.previous {
        config.buttons.previous = KeyBindings::from_names(&[], names, &[])?.previous;
    }
    if let Some(ref names) = file.buttons.shutdown {
        config.buttons.shutdown = KeyBindings::from_names(&[], &[], names)?.shutdown;
    }
    if config.buttons.shutdown.is_empty() {
        tracing::warn!("No shutdown key bound; falling back to defaults");
        config.buttons.shutdown = defaults.shutdown;
    }

    Ok(())
}

/// Apply environment overrides, reading variables through `lookup`
fn apply_env_config<F>(config: &mut TickerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(index) = lookup("TICKER_INITIAL_FEED").and_then(|v| v.parse::<usize>().ok()) {
        config.initial_feed = index;
        config.source = ConfigSource::Env;
    }
    if let Some(cols) = lookup("TICKER_COLS").and_then(|v| v.parse::<u16>().ok()) {
        config.viewer.width = usize::from(cols);
        config.source = ConfigSource::Env;
    }
    if let Some(rows) = lookup("TICKER_ROWS").and_then(|v| v.parse::<u16>().ok()) {
        config.rows = rows;
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("TICKER_DWELL_SECS").and_then(|v| v.parse::<u64>().ok()) {
        config.viewer.dwell = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = lookup("TICKER_SCROLL_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.viewer.scroll_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("TICKER_SHUTDOWN_DELAY_SECS").and_then(|v| v.parse::<u64>().ok())
    {
        config.shutdown.delay = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(poweroff) = lookup("TICKER_POWEROFF") {
        config.shutdown.poweroff = poweroff != "0" && poweroff.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Initial feed index override
    pub initial_feed: Option<usize>,
    /// Dwell time override (seconds)
    pub dwell_secs: Option<u64>,
    /// Display width override
    pub cols: Option<u16>,
    /// Display height override
    pub rows: Option<u16>,
    /// Poweroff override
    pub poweroff: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set initial feed override
    #[must_use]
    pub fn with_initial_feed(mut self, index: usize) -> Self {
        self.initial_feed = Some(index);
        self
    }

    /// Set dwell time override
    #[must_use]
    pub fn with_dwell_secs(mut self, secs: u64) -> Self {
        self.dwell_secs = Some(secs);
        self
    }

    /// Set display size override
    #[must_use]
    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = Some(cols);
        self.rows = Some(rows);
        self
    }

    /// Set poweroff override
    #[must_use]
    pub fn with_poweroff(mut self, poweroff: bool) -> Self {
        self.poweroff = Some(poweroff);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut TickerConfig) {
        if self.initial_feed.is_some()
            || self.dwell_secs.is_some()
            || self.cols.is_some()
            || self.rows.is_some()
            || self.poweroff.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(index) = self.initial_feed {
            config.initial_feed = index;
        }
        if let Some(secs) = self.dwell_secs {
            config.viewer.dwell = Duration::from_secs(secs);
        }
        if let Some(cols) = self.cols {
            config.viewer.width = usize::from(cols);
        }
        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        if let Some(poweroff) = self.poweroff {
            config.shutdown.poweroff = poweroff;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
