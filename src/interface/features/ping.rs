//! # Ping Feature
//!
//! Liveness checks: `/ping`, the user and message context-menu commands, and a
//! heartbeat that logs how many messages went by.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::application::feature::{Feature, FeatureContext};
use crate::application::guards::Cooldown;
use crate::application::logging::FeatureLogger;
use crate::application::registry::{Declarations, SchedulerOptions};
use crate::domain::types::{CommandMetadata, FeatureDescriptor, MethodCall, MethodReply};
use crate::strings::messages;

pub struct Ping {
    started: Instant,
    messages_seen: AtomicU64,
    logger: OnceLock<FeatureLogger>,
}

impl Default for Ping {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            messages_seen: AtomicU64::new(0),
            logger: OnceLock::new(),
        }
    }
}

impl Ping {
    fn log(&self, message: &str) {
        if let Some(logger) = self.logger.get() {
            logger.info(message);
        }
    }
}

#[async_trait]
impl Feature for Ping {
    fn metadata(&self) -> FeatureDescriptor {
        FeatureDescriptor::new("ping", env!("CARGO_PKG_VERSION"))
    }

    fn methods(&self) -> &'static [&'static str] {
        &["ping", "whois", "quote", "on_ready", "on_message", "heartbeat"]
    }

    async fn call(&self, method: &str, call: MethodCall) -> Result<MethodReply> {
        match (method, call) {
            ("ping", MethodCall::Command(cmd)) => {
                let text = messages::pong(
                    self.started.elapsed().as_secs(),
                    self.messages_seen.load(Ordering::Relaxed),
                );
                cmd.responder.reply(&text, false).await.map_err(|e| anyhow::anyhow!(e))?;
            }
            ("whois", MethodCall::Command(cmd)) => {
                let user = cmd.option_str("target").unwrap_or(&cmd.actor.user_id).to_string();
                let roles = if user == cmd.actor.user_id { cmd.actor.roles.clone() } else { Vec::new() };
                cmd.responder
                    .reply(&messages::whois(&user, &roles), true)
                    .await
                    .map_err(|e| anyhow::anyhow!(e))?;
            }
            ("quote", MethodCall::Command(cmd)) => {
                let text = cmd.option_str("message").unwrap_or_default();
                cmd.responder.reply(&messages::quote(text), false).await.map_err(|e| anyhow::anyhow!(e))?;
            }
            ("on_ready", MethodCall::Event(_)) => self.log("Gateway ready"),
            ("on_message", MethodCall::Event(_)) => {
                self.messages_seen.fetch_add(1, Ordering::Relaxed);
            }
            ("heartbeat", MethodCall::Scheduled) => {
                self.log(&format!(
                    "Heartbeat: {} messages seen",
                    self.messages_seen.load(Ordering::Relaxed)
                ));
            }
            (method, call) => anyhow::bail!("ping cannot handle {} call to '{}'", call.label(), method),
        }
        Ok(MethodReply::Done)
    }

    async fn on_load(&self, ctx: &FeatureContext) -> Result<()> {
        let _ = self.logger.set(ctx.logger.clone());
        Ok(())
    }

    fn declare(decl: &mut Declarations<'_>) {
        decl.command("ping", CommandMetadata::new("ping", "Check that the bot is alive"))
            .guard("ping", Arc::new(Cooldown::new(Duration::from_secs(3))))
            .user_command("whois", "Who is this")
            .message_command("quote", "Quote message")
            .once("on_ready", "ready")
            .on("on_message", "message")
            .schedule("heartbeat", SchedulerOptions::every(Duration::from_secs(300)));
    }
}
