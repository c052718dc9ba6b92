//! # Error Types
//!
//! Typed errors returned across the runtime boundary. Feature code itself works with
//! `anyhow::Result`; these enums cover registration, rate limiting, scheduling and
//! custom-id encoding.

use std::time::Duration;
use thiserror::Error;

use crate::domain::types::InteractionKind;

/// Errors raised while registering features or their routes.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("feature metadata is missing a name")]
    MissingName,

    #[error("feature '{0}' is already registered")]
    DuplicateFeature(String),

    #[error("feature '{0}' is not registered")]
    FeatureNotFound(String),

    #[error("command '{0}' is already registered")]
    DuplicateCommand(String),

    #[error("{kind} handler for '{pattern}' is already registered")]
    DuplicateInteraction {
        kind: InteractionKind,
        pattern: String,
    },

    #[error("invalid interaction pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{hook} hook of feature '{feature}' failed: {message}")]
    Hook {
        feature: String,
        hook: &'static str,
        message: String,
    },
}

/// Errors returned to the caller of `RateLimiter::enqueue`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limiter is stopped")]
    Stopped,

    #[error("rate limiter queue is full ({capacity} tasks)")]
    QueueFull { capacity: usize },

    #[error("task {task_id} was cancelled")]
    Cancelled { task_id: String },

    #[error("task {task_id} timed out after {timeout:?}")]
    Timeout { task_id: String, timeout: Duration },

    #[error("task {task_id} failed: {message}")]
    Failed { task_id: String, message: String },

    /// The task panicked or its runtime went away before it settled.
    #[error("task {task_id} was dropped before completion")]
    Dropped { task_id: String },
}

/// Errors raised when a scheduled job cannot be created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("invalid cron pattern '{pattern}': {reason}")]
    InvalidCron { pattern: String, reason: String },

    #[error("scheduler '{0}' has neither a cron pattern nor an interval")]
    MissingTrigger(String),

    #[error("scheduler '{0}' has a zero interval")]
    ZeroInterval(String),
}

/// Errors raised while building or decoding custom ids.
#[derive(Error, Debug)]
pub enum CustomIdError {
    #[error("custom id is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("custom id metadata is invalid: {0}")]
    Metadata(String),
}
