//! # Interface Layer
//!
//! The features shipped with the demo binary.

pub mod features;
