//! # Infrastructure Layer
//!
//! In-process adapters for the collaborators the runtime talks to.
//! Implements the traits defined in the Domain layer (`EventSource`, `Responder`, `CommandSync`).

pub mod console;
pub mod event_hub;
pub mod logging;
