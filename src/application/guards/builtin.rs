//! # Built-in Guards
//!
//! Permission, role, context and rate checks shared by features. Each one replies
//! ephemerally to the invoking user when it rejects.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

use crate::application::guards::{Guard, GuardContext};
use crate::domain::types::Permissions;
use crate::strings::messages;

async fn reject(ctx: &GuardContext, message: &str) -> Result<()> {
    ctx.invocation
        .responder()
        .reply(message, true)
        .await
        .map_err(|e| anyhow!(e))
}

/// Requires the invoking member to hold every listed permission.
pub struct RequirePermissions {
    required: Permissions,
}

impl RequirePermissions {
    pub fn new(required: Permissions) -> Self {
        Self { required }
    }
}

#[async_trait]
impl Guard for RequirePermissions {
    fn name(&self) -> &str {
        "require_permissions"
    }

    async fn can_activate(&self, ctx: &GuardContext) -> Result<bool> {
        Ok(ctx.invocation.actor().permissions.grants(self.required))
    }

    async fn on_fail(&self, ctx: &GuardContext) -> Result<()> {
        let missing = self.required - ctx.invocation.actor().permissions;
        reject(ctx, &messages::missing_permissions(&missing.names())).await
    }
}

/// Requires any (default) or all of the listed role ids.
pub struct RequireRoles {
    roles: Vec<String>,
    require_all: bool,
}

impl RequireRoles {
    pub fn any<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            require_all: false,
        }
    }

    pub fn all<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            require_all: true,
            ..Self::any(roles)
        }
    }
}

#[async_trait]
impl Guard for RequireRoles {
    fn name(&self) -> &str {
        "require_roles"
    }

    async fn can_activate(&self, ctx: &GuardContext) -> Result<bool> {
        let held = &ctx.invocation.actor().roles;
        let has = |role: &String| held.contains(role);
        Ok(if self.require_all {
            self.roles.iter().all(has)
        } else {
            self.roles.iter().any(has)
        })
    }

    async fn on_fail(&self, ctx: &GuardContext) -> Result<()> {
        let message = if self.require_all {
            messages::missing_all_roles(&self.roles)
        } else {
            messages::missing_roles(&self.roles)
        };
        reject(ctx, &message).await
    }
}

/// Rejects invocations from direct messages.
pub struct GuildOnly;

#[async_trait]
impl Guard for GuildOnly {
    fn name(&self) -> &str {
        "guild_only"
    }

    async fn can_activate(&self, ctx: &GuardContext) -> Result<bool> {
        Ok(ctx.invocation.actor().guild_id.is_some())
    }

    async fn on_fail(&self, ctx: &GuardContext) -> Result<()> {
        reject(ctx, messages::GUILD_ONLY).await
    }
}

/// Only lets the configured owners through.
pub struct OwnerOnly {
    owners: HashSet<String>,
}

impl OwnerOnly {
    pub fn new<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Guard for OwnerOnly {
    fn name(&self) -> &str {
        "owner_only"
    }

    async fn can_activate(&self, ctx: &GuardContext) -> Result<bool> {
        Ok(self.owners.contains(&ctx.invocation.actor().user_id))
    }

    async fn on_fail(&self, ctx: &GuardContext) -> Result<()> {
        reject(ctx, messages::OWNER_ONLY).await
    }
}

/// Per-user cooldown, scoped to the guarded `feature.method`.
pub struct Cooldown {
    window: Duration,
    last_use: Mutex<HashMap<String, Instant>>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_use: Mutex::new(HashMap::new()),
        }
    }

    fn key(ctx: &GuardContext) -> String {
        format!("{}.{}:{}", ctx.feature, ctx.method, ctx.invocation.actor().user_id)
    }

    fn remaining(&self, ctx: &GuardContext) -> Duration {
        self.last_use
            .lock()
            .get(&Self::key(ctx))
            .map(|last| self.window.saturating_sub(last.elapsed()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Guard for Cooldown {
    fn name(&self) -> &str {
        "cooldown"
    }

    async fn can_activate(&self, ctx: &GuardContext) -> Result<bool> {
        let now = Instant::now();
        let mut last_use = self.last_use.lock();
        // Prune expired entries.
        last_use.retain(|_, at| now.duration_since(*at) < self.window);

        let key = Self::key(ctx);
        if last_use.contains_key(&key) {
            return Ok(false);
        }
        last_use.insert(key, now);
        Ok(true)
    }

    async fn on_fail(&self, ctx: &GuardContext) -> Result<()> {
        let secs = self.remaining(ctx).as_secs_f64().ceil() as u64;
        reject(ctx, &messages::cooldown(secs.max(1))).await
    }
}
