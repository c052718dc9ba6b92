//! # Strings Module
//!
//! Centralizes user-facing strings so guard and error replies stay consistent.

pub mod messages;
