//! # Reminders Feature
//!
//! `/remind minutes=N text=...` stores a reminder and answers with custom ids for the
//! cancel button, the snooze select menu and the edit modal. A sweep job delivers due
//! reminders through the shared outbound rate limiter.
//!
//! All custom ids live under the `rem:` namespace.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::application::feature::{Feature, FeatureContext};
use crate::application::guards::{Cooldown, RequirePermissions};
use crate::application::rate_limiter::{EnqueueOptions, RateLimiter};
use crate::application::registry::{Declarations, SchedulerOptions};
use crate::domain::custom_id::{CustomIdBuilder, ParsedCustomId};
use crate::domain::errors::RateLimitError;
use crate::domain::pattern::InteractionPattern;
use crate::domain::traits::Responder;
use crate::domain::types::{
    AutocompleteInvocation, CommandInvocation, CommandMetadata, CommandOption, FeatureDescriptor,
    InteractionInvocation, MethodCall, MethodReply, OptionChoice, Permissions,
};
use crate::strings::messages;

pub const NAMESPACE: &str = "rem";
const MAX_MINUTES: i64 = 24 * 60;
const HISTORY_LIMIT: usize = 50;
/// Failed deliveries are retried on later sweeps, then dropped.
const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Suggestions offered for the `text` option when nothing matches the user's history.
const COMMON_REMINDERS: &[&str] = &["stand up", "drink water", "check the oven", "join the call"];

struct Reminder {
    id: u64,
    user_id: String,
    text: String,
    due: DateTime<Utc>,
    responder: Arc<dyn Responder>,
    attempts: u32,
}

/// Carried in the snooze menu id; every snooze reply hands out a new id with the count bumped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct SnoozeMeta {
    snoozes: u32,
}

pub struct Reminders {
    pending: Arc<Mutex<Vec<Reminder>>>,
    history: Mutex<Vec<String>>,
    next_id: AtomicU64,
    outbound: OnceLock<RateLimiter>,
}

impl Default for Reminders {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(Vec::new())),
            history: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            outbound: OnceLock::new(),
        }
    }
}

impl Reminders {
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    async fn remind(&self, cmd: CommandInvocation) -> Result<()> {
        let (Some(minutes), Some(text)) = (cmd.option_i64("minutes"), cmd.option_str("text")) else {
            return reply(cmd.responder.as_ref(), messages::REMIND_USAGE, true).await;
        };
        if !(1..=MAX_MINUTES).contains(&minutes) || text.trim().is_empty() {
            return reply(cmd.responder.as_ref(), messages::REMIND_USAGE, true).await;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = text.trim().to_string();
        {
            let mut history = self.history.lock();
            history.push(text.clone());
            if history.len() > HISTORY_LIMIT {
                history.remove(0);
            }
        }
        self.pending.lock().push(Reminder {
            id,
            user_id: cmd.actor.user_id.clone(),
            text,
            due: Utc::now() + chrono::Duration::minutes(minutes),
            responder: cmd.responder.clone(),
            attempts: 0,
        });

        let cancel_id = CustomIdBuilder::new("cancel").namespace(NAMESPACE).arg(id).build_checked()?;
        let snooze_id = snooze_id(id, 0)?;
        reply(
            cmd.responder.as_ref(),
            &messages::reminder_set(id, minutes, &cancel_id, &snooze_id),
            true,
        )
        .await
    }

    async fn list(&self, cmd: CommandInvocation) -> Result<()> {
        let lines: Vec<String> = self
            .pending
            .lock()
            .iter()
            .filter(|r| r.user_id == cmd.actor.user_id)
            .map(|r| format!("#{} at {} - {}", r.id, r.due.format("%H:%M UTC"), r.text))
            .collect();
        let text = if lines.is_empty() {
            messages::NO_REMINDERS.to_string()
        } else {
            messages::reminder_list(&lines)
        };
        reply(cmd.responder.as_ref(), &text, true).await
    }

    async fn clear(&self, cmd: CommandInvocation) -> Result<()> {
        let count = {
            let mut pending = self.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        reply(cmd.responder.as_ref(), &messages::reminders_cleared(count), false).await
    }

    fn suggest(&self, input: &AutocompleteInvocation) -> Vec<OptionChoice> {
        let needle = input.value.to_lowercase();
        let history = self.history.lock();
        let mut seen = Vec::new();
        history
            .iter()
            .rev()
            .map(String::as_str)
            .chain(COMMON_REMINDERS.iter().copied())
            .filter(|text| text.to_lowercase().contains(&needle))
            .filter(|text| {
                let fresh = !seen.contains(text);
                if fresh {
                    seen.push(*text);
                }
                fresh
            })
            .map(|text| OptionChoice::new(text, text))
            .collect()
    }

    /// Reminder id from `rem:<action>:<id>...`.
    fn reminder_id(custom_id: &str) -> Result<u64> {
        let parsed = ParsedCustomId::parse(custom_id);
        parsed
            .part(2)
            .context("custom id has no reminder id")?
            .parse()
            .with_context(|| format!("bad reminder id in '{custom_id}'"))
    }

    /// Apply `f` to the caller's reminder and reply with its message, or say it is gone.
    async fn with_reminder<F>(&self, interaction: &InteractionInvocation, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Reminder>, usize) -> String + Send,
    {
        let id = Self::reminder_id(&interaction.custom_id)?;
        let text = {
            let mut pending = self.pending.lock();
            pending
                .iter()
                .position(|r| r.id == id && r.user_id == interaction.actor.user_id)
                .map(|index| f(&mut *pending, index))
        };
        let text = text.unwrap_or_else(|| messages::REMINDER_NOT_FOUND.to_string());
        reply(interaction.responder.as_ref(), &text, true).await
    }

    async fn cancel(&self, interaction: InteractionInvocation) -> Result<()> {
        self.with_reminder(&interaction, |pending, index| {
            let removed = pending.remove(index);
            messages::reminder_cancelled(removed.id)
        })
        .await
    }

    async fn snooze(&self, interaction: InteractionInvocation) -> Result<()> {
        let minutes: i64 = interaction
            .values
            .first()
            .context("snooze menu sent no value")?
            .parse()
            .context("snooze value is not a number")?;
        let minutes = minutes.clamp(1, MAX_MINUTES);
        let meta: Option<SnoozeMeta> = ParsedCustomId::parse(&interaction.custom_id).metadata()?;
        let snoozes = meta.map_or(0, |m| m.snoozes) + 1;

        self.with_reminder(&interaction, |pending, index| {
            let reminder = &mut pending[index];
            reminder.due += chrono::Duration::minutes(minutes);
            tracing::debug!(reminder = reminder.id, snoozes, "Reminder snoozed");
            match snooze_id(reminder.id, snoozes) {
                Ok(next_id) => messages::reminder_snoozed(reminder.id, minutes, snoozes, &next_id),
                Err(e) => {
                    tracing::warn!(reminder = reminder.id, "Could not build snooze id: {}", e);
                    messages::reminder_snoozed(reminder.id, minutes, snoozes, "")
                }
            }
        })
        .await
    }

    async fn edit(&self, interaction: InteractionInvocation) -> Result<()> {
        let text = interaction
            .fields
            .get("text")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .context("edit modal sent no text")?;

        self.with_reminder(&interaction, |pending, index| {
            pending[index].text = text;
            messages::reminder_edited(pending[index].id)
        })
        .await
    }

    /// Deliver every due reminder through the outbound limiter. A reminder whose
    /// delivery is refused or fails goes back to `pending` for the next sweep,
    /// up to [`MAX_DELIVERY_ATTEMPTS`].
    fn sweep(&self) {
        let now = Utc::now();
        let due: Vec<Reminder> = {
            let mut pending = self.pending.lock();
            let (due, keep): (Vec<Reminder>, Vec<Reminder>) = pending.drain(..).partition(|r| r.due <= now);
            *pending = keep;
            due
        };
        let Some(outbound) = self.outbound.get() else {
            self.pending.lock().extend(due);
            return;
        };

        for reminder in due {
            let responder = reminder.responder.clone();
            let text = messages::reminder_due(&reminder.user_id, &reminder.text);
            let submitted = outbound.submit(
                move || async move { responder.reply(&text, false).await.map_err(|e| anyhow::anyhow!(e)) },
                EnqueueOptions::default()
                    .with_id(format!("reminder-{}-{}", reminder.id, reminder.attempts))
                    .timeout(Duration::from_secs(10)),
            );
            match submitted {
                Ok(handle) => {
                    let pending = Arc::clone(&self.pending);
                    tokio::spawn(async move {
                        if let Err(e) = handle.wait().await {
                            requeue(&pending, reminder, &e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(reminder = reminder.id, "Delivery deferred: {}", e);
                    self.pending.lock().push(reminder);
                }
            }
        }
    }
}

fn requeue(pending: &Mutex<Vec<Reminder>>, mut reminder: Reminder, error: &RateLimitError) {
    reminder.attempts += 1;
    if reminder.attempts >= MAX_DELIVERY_ATTEMPTS {
        tracing::error!(
            reminder = reminder.id,
            attempts = reminder.attempts,
            "Giving up on reminder delivery: {}",
            error
        );
        return;
    }
    tracing::warn!(reminder = reminder.id, attempts = reminder.attempts, "Delivery failed, retrying: {}", error);
    pending.lock().push(reminder);
}

fn snooze_id(id: u64, snoozes: u32) -> Result<String> {
    Ok(CustomIdBuilder::new("snooze")
        .namespace(NAMESPACE)
        .arg(id)
        .metadata(&SnoozeMeta { snoozes })?
        .build_checked()?)
}

async fn reply(responder: &dyn Responder, text: &str, ephemeral: bool) -> Result<()> {
    responder.reply(text, ephemeral).await.map_err(|e| anyhow::anyhow!(e))
}

#[async_trait]
impl Feature for Reminders {
    fn metadata(&self) -> FeatureDescriptor {
        FeatureDescriptor::new("reminders", env!("CARGO_PKG_VERSION")).with_prefix(format!("{NAMESPACE}:"))
    }

    fn methods(&self) -> &'static [&'static str] {
        &["remind", "list", "clear", "suggest_text", "cancel", "snooze", "edit", "sweep"]
    }

    async fn call(&self, method: &str, call: MethodCall) -> Result<MethodReply> {
        match (method, call) {
            ("remind", MethodCall::Command(cmd)) => self.remind(cmd).await?,
            ("list", MethodCall::Command(cmd)) => self.list(cmd).await?,
            ("clear", MethodCall::Command(cmd)) => self.clear(cmd).await?,
            ("suggest_text", MethodCall::Autocomplete(input)) => {
                return Ok(MethodReply::Choices(self.suggest(&input)));
            }
            ("cancel", MethodCall::Interaction(i)) => self.cancel(i).await?,
            ("snooze", MethodCall::Interaction(i)) => self.snooze(i).await?,
            ("edit", MethodCall::Interaction(i)) => self.edit(i).await?,
            ("sweep", MethodCall::Scheduled) => self.sweep(),
            (method, call) => anyhow::bail!("reminders cannot handle {} call to '{}'", call.label(), method),
        }
        Ok(MethodReply::Done)
    }

    async fn on_load(&self, ctx: &FeatureContext) -> Result<()> {
        let _ = self.outbound.set(ctx.outbound.clone());
        ctx.logger.debug("Reminder store ready");
        Ok(())
    }

    async fn on_unload(&self, ctx: &FeatureContext) -> Result<()> {
        let dropped = self.pending_count();
        if dropped > 0 {
            ctx.logger.warn(&format!("Dropping {dropped} undelivered reminders"));
        }
        Ok(())
    }

    fn declare(decl: &mut Declarations<'_>) {
        decl.command(
            "remind",
            CommandMetadata::new("remind", "Remind me about something")
                .option(CommandOption::integer("minutes", "Minutes from now").required())
                .option(CommandOption::string("text", "What to remind you of").required().autocomplete()),
        )
        .guard("remind", Arc::new(Cooldown::new(Duration::from_secs(2))))
        .autocomplete("suggest_text", "remind", Some("text"))
        .command("list", CommandMetadata::new("reminders", "List your pending reminders"))
        .command(
            "clear",
            CommandMetadata::new("reminders-clear", "Drop every pending reminder")
                .permissions(Permissions::MANAGE_MESSAGES)
                .guild_only(),
        )
        .guard("clear", Arc::new(RequirePermissions::new(Permissions::MANAGE_MESSAGES)))
        .button("cancel", rule(r"^cancel:\d+$"))
        .select("snooze", rule(r"^snooze:\d+"))
        .modal("edit", rule(r"^edit:\d+$"))
        .schedule("sweep", SchedulerOptions::every(Duration::from_secs(5)));
    }
}

fn rule(pattern: &str) -> InteractionPattern {
    // Patterns are compile-time literals; a broken one degrades to a literal that never matches.
    InteractionPattern::rule(pattern).unwrap_or_else(|e| {
        tracing::error!(pattern, "Invalid interaction rule: {}", e);
        InteractionPattern::literal(format!("invalid:{pattern}"))
    })
}
