//! # Application Layer
//!
//! The feature runtime proper: declarative registration, the feature lifecycle,
//! the dispatch surfaces (commands, interactions, events, schedulers), the guard
//! pipeline and the outbound rate limiter.

pub mod commands;
pub mod events;
pub mod feature;
pub mod guards;
pub mod interactions;
pub mod logging;
pub mod manager;
pub mod rate_limiter;
pub mod registry;
pub mod reporting;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;
