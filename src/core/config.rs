//! Governor configuration.
//!
//! A [`GovernorConfig`] is constructed once (from defaults or a TOML file)
//! and handed to the orchestrator as an immutable snapshot; workers receive
//! the slices they need at construction and never see it change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// One configured per-process priority rule. Priorities are kept as strings
/// here; they are parsed into enums when rules are registered so that a bad
/// name rejects the entry instead of silently defaulting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Executable name to match (case-insensitive)
    pub process_name: String,
    /// CPU class name: Idle, BelowNormal, Normal, AboveNormal, High, Realtime
    pub cpu_priority: String,
    /// IO class name: VeryLow, Low, Normal, High
    pub io_priority: String,
    /// Only enabled rules are registered at startup
    pub enabled: bool,
}

/// Main governor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Run the standby memory reclaim loop
    pub memory_reclaim_enabled: bool,

    /// Reclaim when available memory drops below this many bytes
    pub memory_threshold_bytes: u64,

    /// Seconds between memory checks
    pub memory_check_interval_secs: u64,

    /// Seconds between priority enforcement sweeps
    pub sweep_interval_secs: u64,

    /// Disable the OS prefetch service (SysMain/preload) at startup
    pub prefetch_service_disabled: bool,

    /// Per-process priority rules, applied in order (later entries for the
    /// same process name overwrite earlier ones)
    pub rules: Vec<RuleConfig>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            memory_reclaim_enabled: true,
            memory_threshold_bytes: 1024 * 1024 * 1024,
            memory_check_interval_secs: 5,
            sweep_interval_secs: 10,
            prefetch_service_disabled: false,
            rules: Vec::new(),
        }
    }
}

impl GovernorConfig {
    /// Load config from a TOML file. A missing file yields the defaults;
    /// a malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Check construction-time invariants. These are the only failures that
    /// are fatal to initialization; everything downstream is per-tick
    /// contained.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_threshold_bytes == 0 {
            return Err(ConfigError::NonPositiveThreshold);
        }
        if self.memory_check_interval_secs == 0 {
            return Err(ConfigError::NonPositiveInterval("memory_check_interval_secs"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::NonPositiveInterval("sweep_interval_secs"));
        }
        if self.rules.iter().any(|r| r.process_name.trim().is_empty()) {
            return Err(ConfigError::EmptyProcessName);
        }
        Ok(())
    }

    pub fn memory_check_interval(&self) -> Duration {
        Duration::from_secs(self.memory_check_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Fatal configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// memory_threshold_bytes must be positive
    NonPositiveThreshold,
    /// The named interval must be positive
    NonPositiveInterval(&'static str),
    /// A rule has an empty process name
    EmptyProcessName,
    /// Reading or writing the config file failed
    Io(String),
    /// The config file could not be parsed
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositiveThreshold => {
                write!(f, "memory_threshold_bytes must be greater than zero")
            }
            ConfigError::NonPositiveInterval(name) => {
                write!(f, "{} must be greater than zero", name)
            }
            ConfigError::EmptyProcessName => write!(f, "rule process_name must not be empty"),
            ConfigError::Io(msg) => write!(f, "config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
