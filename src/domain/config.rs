//! # Configuration
//!
//! Loads and parses the runtime configuration file (`data/config.yaml`).
//! Defines the structs for logging, rate limiting, guard owners and per-feature overrides.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "data/config.yaml";

/// Main runtime configuration structure.
/// Matches the layout of `data/config.yaml`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limiter: RateLimiterConfig,
    /// User ids allowed past owner-only guards.
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub features: HashMap<String, FeatureConfig>,
}

impl RuntimeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.rate_limiter.validate()?;
        Ok(config)
    }

    /// Overrides for one feature, or the defaults.
    pub fn feature(&self, name: &str) -> FeatureConfig {
        self.features.get(name).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Optional log file; directories are created on startup.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            ansi: default_ansi(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_ansi() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// Strict arrival order; priorities are ignored.
    #[default]
    Fifo,
    /// Higher priority first, arrival order among equals.
    Priority,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimiterConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// 0 means unbounded.
    #[serde(default)]
    pub max_queue_size: usize,
    #[serde(default)]
    pub mode: QueueMode,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            max_queue_size: 0,
            mode: QueueMode::Fifo,
        }
    }
}

fn default_max_requests() -> usize {
    5
}

fn default_window_ms() -> u64 {
    1000
}

impl RateLimiterConfig {
    pub fn new(max_requests: usize, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
            ..Self::default()
        }
    }

    pub fn with_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    pub fn with_mode(mut self, mode: QueueMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            bail!("rate_limiter.max_requests must be at least 1");
        }
        if self.window_ms == 0 {
            bail!("rate_limiter.window_ms must be at least 1");
        }
        Ok(())
    }

    /// Minimum spacing between two task starts: `window / max_requests`.
    pub fn min_interval(&self) -> Duration {
        let divisor = u32::try_from(self.max_requests.max(1)).unwrap_or(u32::MAX);
        Duration::from_millis(self.window_ms) / divisor
    }
}

/// Per-feature overrides.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FeatureConfig {
    /// Overrides the descriptor's `enabled` default when set.
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub settings: serde_json::Value,
}
