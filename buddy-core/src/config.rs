//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/buddy/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/buddy/` (~/.config/buddy/)
//! - State/Logs: `$XDG_STATE_HOME/buddy/` (~/.local/state/buddy/)
//!
//! Every detector tunable has a default, so an absent or partial config
//! file is always valid.

use crate::error::{Error, Result};
use crate::types::ActivityState;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

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

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Where to look for transcripts
    #[serde(default)]
    pub watch: WatchConfig,

    /// Activity state machine timing and tool mapping
    #[serde(default)]
    pub activity: ActivityConfig,

    /// Mood scoreboard tuning
    #[serde(default)]
    pub mood: MoodConfig,

    /// Flow detection tuning
    #[serde(default)]
    pub flow: FlowConfig,

    /// Breakthrough detection tuning
    #[serde(default)]
    pub eureka: EurekaConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transcript location
#[derive(Debug, Deserialize, Default, Clone)]
pub struct WatchConfig {
    /// Override for the transcript root (default: ~/.claude/projects)
    pub logs_path: Option<PathBuf>,
}

impl WatchConfig {
    /// Resolve the transcript root, expanding a leading `~/`.
    pub fn resolved_logs_path(&self) -> PathBuf {
        match &self.logs_path {
            Some(path) => match path.strip_prefix("~") {
                Ok(rest) => home_dir().join(rest),
                Err(_) => path.clone(),
            },
            None => Config::default_logs_path(),
        }
    }
}

/// Activity state machine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ActivityConfig {
    /// Seconds without activity before the state falls back to idle
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Seconds without activity before connectivity is reported lost
    #[serde(default = "default_connectivity_timeout_secs")]
    pub connectivity_timeout_secs: u64,

    /// Tool name -> state overrides, merged over the built-in table
    #[serde(default)]
    pub tool_states: HashMap<String, ActivityState>,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            connectivity_timeout_secs: default_connectivity_timeout_secs(),
            tool_states: HashMap::new(),
        }
    }
}

impl ActivityConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity_timeout_secs)
    }
}

fn default_idle_timeout_secs() -> u64 {
    10
}

fn default_connectivity_timeout_secs() -> u64 {
    30
}

/// Mood scoreboard configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MoodConfig {
    /// A mood must score strictly above this to become active
    #[serde(default = "default_mood_threshold")]
    pub threshold: f64,

    /// Amount subtracted from every positive score per decay tick
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Milliseconds between decay ticks
    #[serde(default = "default_decay_interval_ms")]
    pub decay_interval_ms: u64,

    /// Score added per matching keyword pattern in assistant text
    #[serde(default = "default_text_weight")]
    pub text_weight: f64,

    /// Score added to frustrated for an errored tool result
    #[serde(default = "default_error_bonus")]
    pub error_bonus: f64,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            threshold: default_mood_threshold(),
            decay_rate: default_decay_rate(),
            decay_interval_ms: default_decay_interval_ms(),
            text_weight: default_text_weight(),
            error_bonus: default_error_bonus(),
        }
    }
}

impl MoodConfig {
    pub fn decay_interval(&self) -> Duration {
        Duration::from_millis(self.decay_interval_ms)
    }
}

fn default_mood_threshold() -> f64 {
    2.0
}

fn default_decay_rate() -> f64 {
    0.3
}

fn default_decay_interval_ms() -> u64 {
    1000
}

fn default_text_weight() -> f64 {
    1.0
}

fn default_error_bonus() -> f64 {
    2.0
}

/// Flow detection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FlowConfig {
    /// Recency horizon of the activity window in seconds
    #[serde(default = "default_flow_window_secs")]
    pub window_secs: u64,

    /// Number of activities within the window that enters flow
    #[serde(default = "default_flow_threshold")]
    pub threshold: usize,

    /// Quiet seconds after which flow lapses
    #[serde(default = "default_flow_decay_secs")]
    pub decay_secs: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window_secs: default_flow_window_secs(),
            threshold: default_flow_threshold(),
            decay_secs: default_flow_decay_secs(),
        }
    }
}

impl FlowConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn decay(&self) -> Duration {
        Duration::from_secs(self.decay_secs)
    }
}

fn default_flow_window_secs() -> u64 {
    15
}

fn default_flow_threshold() -> usize {
    5
}

fn default_flow_decay_secs() -> u64 {
    10
}

/// Breakthrough detection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EurekaConfig {
    /// Number of past states kept for pattern matching
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

impl Default for EurekaConfig {
    fn default() -> Self {
        Self {
            history_len: default_history_len(),
        }
    }
}

fn default_history_len() -> usize {
    10
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
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
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a detector misbehave
    pub fn validate(&self) -> Result<()> {
        if self.activity.idle_timeout_secs == 0 {
            return Err(Error::Config(
                "activity.idle_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.activity.connectivity_timeout_secs <= self.activity.idle_timeout_secs {
            return Err(Error::Config(
                "activity.connectivity_timeout_secs must be greater than idle_timeout_secs"
                    .to_string(),
            ));
        }
        if self.mood.decay_interval_ms == 0 {
            return Err(Error::Config(
                "mood.decay_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.mood.decay_rate <= 0.0 || self.mood.threshold < 0.0 {
            return Err(Error::Config(
                "mood.decay_rate must be positive and mood.threshold non-negative".to_string(),
            ));
        }
        if self.flow.threshold == 0 || self.flow.window_secs == 0 || self.flow.decay_secs == 0 {
            return Err(Error::Config(
                "flow.threshold, flow.window_secs and flow.decay_secs must be at least 1"
                    .to_string(),
            ));
        }
        if self.eureka.history_len < 4 {
            return Err(Error::Config(
                "eureka.history_len must be at least 4".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/buddy/config.toml` (~/.config/buddy/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("buddy").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/buddy/` (~/.local/state/buddy/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("buddy")
    }

    /// Returns the default transcript root (~/.claude/projects)
    pub fn default_logs_path() -> PathBuf {
        home_dir().join(".claude").join("projects")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.activity.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.activity.connectivity_timeout(), Duration::from_secs(30));
        assert_eq!(config.mood.threshold, 2.0);
        assert_eq!(config.mood.decay_interval(), Duration::from_secs(1));
        assert_eq!(config.flow.threshold, 5);
        assert_eq!(config.eureka.history_len, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[watch]
logs_path = "/tmp/transcripts"

[activity]
idle_timeout_secs = 5
connectivity_timeout_secs = 60

[activity.tool_states]
Bash = "building"
Deploy = "bash"

[mood]
decay_rate = 0.5

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(
            config.watch.resolved_logs_path(),
            PathBuf::from("/tmp/transcripts")
        );
        assert_eq!(config.activity.idle_timeout_secs, 5);
        assert_eq!(
            config.activity.tool_states.get("Bash"),
            Some(&ActivityState::Building)
        );
        assert_eq!(
            config.activity.tool_states.get("Deploy"),
            Some(&ActivityState::Bash)
        );
        assert_eq!(config.mood.decay_rate, 0.5);
        assert_eq!(config.mood.threshold, 2.0);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_tool_state_is_rejected() {
        let toml = r#"
[activity.tool_states]
Bash = "dancing"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_connectivity_not_above_idle() {
        let mut config = Config::default();
        config.activity.connectivity_timeout_secs = config.activity.idle_timeout_secs;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validation_rejects_short_history() {
        let mut config = Config::default();
        config.eureka.history_len = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[flow]\nthreshold = 3\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.flow.threshold, 3);
        assert_eq!(config.flow.window_secs, 15);

        std::fs::write(&path, "[flow]\nthreshold = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_state_dir() {
        assert!(Config::state_dir().ends_with("buddy"));
    }
}
