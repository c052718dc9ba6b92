//! # Demo Features
//!
//! `ping` and `reminders` together touch every capability of the runtime: slash and
//! context-menu commands, autocomplete, prefixed interactions, events, schedulers and guards.

pub mod ping;
pub mod reminders;

use anyhow::Result;
use std::sync::Arc;

use crate::application::guards::OwnerOnly;
use crate::application::manager::FeatureManager;

pub use ping::Ping;
pub use reminders::Reminders;

/// Register the demo features. `/reminders-clear` is additionally limited to the
/// configured owners.
pub async fn register_all(manager: &FeatureManager, owners: &[String]) -> Result<()> {
    manager
        .registry()
        .add_guards::<Reminders>("clear", vec![Arc::new(OwnerOnly::new(owners.iter().cloned()))]);

    manager.register_feature(Ping::default).await?;
    manager.register_feature(Reminders::default).await?;
    Ok(())
}
