//! # Domain Layer
//!
//! Plain data and collaborator contracts shared by the runtime: feature descriptors,
//! platform invocations, interaction patterns, custom ids, configuration and error types.
//! Nothing in here owns live state or spawns work.

pub mod config;
pub mod custom_id;
pub mod errors;
pub mod pattern;
pub mod traits;
pub mod types;
