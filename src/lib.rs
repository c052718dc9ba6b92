//! # Feature Runtime
//!
//! Lets independently written chat-bot features register their commands, interactions,
//! event listeners and scheduled jobs declaratively, and dispatches platform traffic to
//! them behind a guard pipeline. Outbound calls share a pacing rate limiter.
//!
//! Layers:
//! - Domain: descriptors, invocations, patterns, custom ids, config, errors, collaborator traits
//! - Application: registry, feature manager, dispatch surfaces, guards, rate limiter
//! - Infrastructure: event hub, console gateway, logging bootstrap
//! - Interface: demo features

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interface;
pub mod strings;

pub use application::commands::{CommandHandler, DispatchOutcome};
pub use application::events::EventDispatcher;
pub use application::feature::{BoundHandler, Feature, FeatureContext};
pub use application::guards::{Guard, GuardContext, GuardExecutor};
pub use application::interactions::InteractionRouter;
pub use application::manager::{FeatureInfo, FeatureManager};
pub use application::rate_limiter::{EnqueueOptions, RateLimiter, RateLimiterStats, TaskHandle};
pub use application::registry::{Declarations, MetadataRegistry, SchedulerOptions};
pub use application::reporting::LoggingErrorReporter;
pub use application::scheduler::SchedulerService;
pub use domain::config::RuntimeConfig;
pub use domain::custom_id::{CustomIdBuilder, ParsedCustomId};
pub use domain::errors::{CustomIdError, RateLimitError, RegistrationError, SchedulerError};
pub use domain::pattern::InteractionPattern;
pub use infrastructure::event_hub::EventHub;
