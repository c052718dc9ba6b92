//! # Messages
//!
//! Constant strings and format functions for user-facing replies.
//! Includes guard rejections and the generic failure notice.

pub const GENERIC_ERROR: &str = "❌ Something went wrong while handling that. Please try again later.";
pub const GUILD_ONLY: &str = "🚫 This can only be used inside a server.";
pub const OWNER_ONLY: &str = "🚫 **Authorization Denied**.";

pub fn missing_permissions(names: &str) -> String {
    format!("🚫 You need the following permissions: {names}")
}

pub fn missing_roles(roles: &[String]) -> String {
    format!("🚫 You need one of these roles: {}", roles.join(", "))
}

pub fn missing_all_roles(roles: &[String]) -> String {
    format!("🚫 You need all of these roles: {}", roles.join(", "))
}

pub fn cooldown(remaining_secs: u64) -> String {
    format!("⏳ Slow down! Try again in {remaining_secs}s.")
}

// Demo features

pub fn pong(uptime_secs: u64, messages_seen: u64) -> String {
    format!("🏓 Pong! Up for {uptime_secs}s, {messages_seen} messages seen.")
}

pub fn whois(user_id: &str, roles: &[String]) -> String {
    if roles.is_empty() {
        format!("👤 **{user_id}** has no roles.")
    } else {
        format!("👤 **{user_id}** has roles: {}", roles.join(", "))
    }
}

pub fn quote(text: &str) -> String {
    format!("> {text}")
}

pub const REMIND_USAGE: &str = "⚠️ Usage: `/remind minutes=<1-1440> text=<what>`";
pub const NO_REMINDERS: &str = "📭 You have no pending reminders.";
pub const REMINDER_NOT_FOUND: &str = "⚠️ That reminder no longer exists.";

pub fn reminder_set(id: u64, minutes: i64, cancel_id: &str, snooze_id: &str) -> String {
    format!("⏰ Reminder #{id} set for {minutes} min. Cancel: `{cancel_id}`, snooze: `{snooze_id}`")
}

pub fn reminder_due(user_id: &str, text: &str) -> String {
    format!("⏰ <@{user_id}> Reminder: {text}")
}

pub fn reminder_list(lines: &[String]) -> String {
    format!("📋 **Pending reminders**\n{}", lines.join("\n"))
}

pub fn reminder_cancelled(id: u64) -> String {
    format!("🗑️ Reminder #{id} cancelled.")
}

pub fn reminder_snoozed(id: u64, minutes: i64, snoozes: u32, snooze_id: &str) -> String {
    if snooze_id.is_empty() {
        return format!("😴 Reminder #{id} snoozed by {minutes} min ({snoozes}x).");
    }
    format!("😴 Reminder #{id} snoozed by {minutes} min ({snoozes}x). Snooze again: `{snooze_id}`")
}

pub fn reminder_edited(id: u64) -> String {
    format!("✏️ Reminder #{id} updated.")
}

pub fn reminders_cleared(count: usize) -> String {
    format!("🧹 Cleared {count} reminders.")
}
