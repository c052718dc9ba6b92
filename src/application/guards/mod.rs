//! # Guards
//!
//! Pre-conditions evaluated before a command or interaction handler runs. Guards run
//! strictly in attachment order and the chain stops at the first failure. A failing guard
//! owns any user-facing feedback through its `on_fail` hook.

pub mod builtin;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::types::Invocation;

pub use builtin::{Cooldown, GuildOnly, OwnerOnly, RequirePermissions, RequireRoles};

/// What a guard gets to look at.
#[derive(Clone)]
pub struct GuardContext {
    pub invocation: Invocation,
    pub feature: String,
    pub method: String,
}

#[async_trait]
pub trait Guard: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// `Ok(false)` rejects the invocation. An `Err` counts as a rejection too, but
    /// `on_fail` is not called for it.
    async fn can_activate(&self, ctx: &GuardContext) -> Result<bool>;

    async fn on_fail(&self, _ctx: &GuardContext) -> Result<()> {
        Ok(())
    }
}

pub struct GuardExecutor;

impl GuardExecutor {
    /// Evaluate `guards` in order. An empty list always passes.
    pub async fn execute(guards: &[Arc<dyn Guard>], ctx: &GuardContext) -> bool {
        for guard in guards {
            match guard.can_activate(ctx).await {
                Ok(true) => continue,
                Ok(false) => {
                    tracing::debug!(
                        guard = guard.name(),
                        feature = %ctx.feature,
                        method = %ctx.method,
                        invocation = ctx.invocation.target(),
                        "Guard rejected invocation"
                    );
                    if let Err(e) = guard.on_fail(ctx).await {
                        tracing::warn!(guard = guard.name(), "Guard failure hook errored: {:#}", e);
                    }
                    return false;
                }
                Err(e) => {
                    tracing::warn!(
                        guard = guard.name(),
                        feature = %ctx.feature,
                        method = %ctx.method,
                        "Guard errored, treating as rejection: {:#}",
                        e
                    );
                    return false;
                }
            }
        }
        true
    }
}
