//! # Feature Logger
//!
//! A logging context handed to each feature. Every record is tagged with the feature's
//! name and version so log lines from different features can be told apart.

use tracing::{Level, debug, error, info, trace, warn};

#[derive(Debug, Clone)]
pub struct FeatureLogger {
    feature: String,
    version: String,
    min_level: Level,
}

impl FeatureLogger {
    pub fn new(feature: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            version: version.into(),
            min_level: Level::TRACE,
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn log(&self, level: Level, message: &str) {
        if level > self.min_level {
            return;
        }

        let (feature, version) = (self.feature.as_str(), self.version.as_str());
        match level {
            Level::ERROR => error!(feature, version, "{}", message),
            Level::WARN => warn!(feature, version, "{}", message),
            Level::INFO => info!(feature, version, "{}", message),
            Level::DEBUG => debug!(feature, version, "{}", message),
            Level::TRACE => trace!(feature, version, "{}", message),
        }
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }
}
