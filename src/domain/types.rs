//! # Domain Types
//!
//! Common data structures used across the runtime: feature descriptors, the platform
//! invocations that reach the dispatchers, and the command definitions pushed back to
//! the platform during sync.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::traits::Responder;

/// Identity and defaults of a feature. One per feature type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Namespace prepended to every interaction pattern the feature registers.
    #[serde(default)]
    pub custom_id_prefix: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl FeatureDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            enabled: true,
            custom_id_prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.custom_id_prefix = Some(prefix.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Lifecycle position of a registered feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureState {
    Registered,
    Enabled,
    Disabled,
}

bitflags! {
    /// Member permissions as reported by the platform.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Permissions: u64 {
        const SEND_MESSAGES = 1 << 0;
        const MANAGE_MESSAGES = 1 << 1;
        const MANAGE_CHANNELS = 1 << 2;
        const MANAGE_ROLES = 1 << 3;
        const KICK_MEMBERS = 1 << 4;
        const BAN_MEMBERS = 1 << 5;
        const MODERATE_MEMBERS = 1 << 6;
        const MANAGE_GUILD = 1 << 7;
        const ADMINISTRATOR = 1 << 8;
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::empty()
    }
}

impl Permissions {
    /// Administrators implicitly hold every permission.
    pub fn grants(&self, required: Permissions) -> bool {
        self.contains(Permissions::ADMINISTRATOR) || self.contains(required)
    }

    /// Human readable names of the set flags, e.g. `MANAGE_GUILD, BAN_MEMBERS`.
    pub fn names(&self) -> String {
        self.iter_names()
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The user behind an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    /// `None` when the invocation comes from a direct message.
    pub guild_id: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Permissions,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn in_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Slash,
    User,
    Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Button,
    Select,
    Modal,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 3] = [Self::Button, Self::Select, Self::Modal];
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Button => f.write_str("button"),
            Self::Select => f.write_str("select"),
            Self::Modal => f.write_str("modal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
}

/// A fixed choice or an autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub name: String,
    pub value: serde_json::Value,
}

impl OptionChoice {
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub autocomplete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<OptionChoice>,
}

impl CommandOption {
    pub fn new(kind: OptionKind, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            autocomplete: false,
            choices: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionKind::String, name, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionKind::Integer, name, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn autocomplete(mut self) -> Self {
        self.autocomplete = true;
        self
    }

    pub fn choice(mut self, choice: OptionChoice) -> Self {
        self.choices.push(choice);
        self
    }
}

/// Declarative command metadata attached to a feature method.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMetadata {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOption>,
    pub default_member_permissions: Option<Permissions>,
    pub dm_permission: bool,
}

impl CommandMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
            default_member_permissions: None,
            dm_permission: true,
        }
    }

    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.default_member_permissions = Some(permissions);
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.dm_permission = false;
        self
    }
}

/// Declarative command definition in the shape the platform expects for bulk sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandDefinition {
    pub name: String,
    /// Context-menu commands carry no description.
    pub description: String,
    #[serde(rename = "type")]
    pub kind: CommandKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
    /// Permission bits as a decimal string.
    pub default_member_permissions: Option<String>,
    pub dm_permission: bool,
}

impl CommandDefinition {
    pub fn from_metadata(kind: CommandKind, metadata: &CommandMetadata) -> Self {
        let (description, options) = match kind {
            CommandKind::Slash => (metadata.description.clone(), metadata.options.clone()),
            CommandKind::User | CommandKind::Message => (String::new(), Vec::new()),
        };
        Self {
            name: metadata.name.clone(),
            description,
            kind,
            options,
            default_member_permissions: metadata
                .default_member_permissions
                .map(|p| p.bits().to_string()),
            dm_permission: metadata.dm_permission,
        }
    }
}

/// A slash or context-menu command as delivered by the gateway.
#[derive(Clone)]
pub struct CommandInvocation {
    pub command_name: String,
    pub kind: CommandKind,
    pub options: HashMap<String, serde_json::Value>,
    pub actor: Actor,
    pub responder: Arc<dyn Responder>,
}

impl CommandInvocation {
    pub fn new(command_name: impl Into<String>, actor: Actor, responder: Arc<dyn Responder>) -> Self {
        Self {
            command_name: command_name.into(),
            kind: CommandKind::Slash,
            options: HashMap::new(),
            actor,
            responder,
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(|v| v.as_str())
    }

    pub fn option_i64(&self, name: &str) -> Option<i64> {
        self.options.get(name).and_then(|v| v.as_i64())
    }
}

/// A button press, select-menu choice or modal submission.
#[derive(Clone)]
pub struct InteractionInvocation {
    pub kind: InteractionKind,
    pub custom_id: String,
    /// Selected values for select menus.
    pub values: Vec<String>,
    /// Submitted text inputs for modals, keyed by input custom id.
    pub fields: HashMap<String, String>,
    pub actor: Actor,
    pub responder: Arc<dyn Responder>,
}

impl InteractionInvocation {
    pub fn new(
        kind: InteractionKind,
        custom_id: impl Into<String>,
        actor: Actor,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            kind,
            custom_id: custom_id.into(),
            values: Vec::new(),
            fields: HashMap::new(),
            actor,
            responder,
        }
    }
}

/// Partial input for an option flagged with `autocomplete`.
#[derive(Debug, Clone, PartialEq)]
pub struct AutocompleteInvocation {
    pub command_name: String,
    /// The option currently focused by the user.
    pub option_name: String,
    pub value: String,
    pub actor: Actor,
}

/// A named platform event with an opaque JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub name: String,
    pub data: serde_json::Value,
}

impl EventPayload {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// The invocation a guard is asked to judge.
#[derive(Clone)]
pub enum Invocation {
    Command(CommandInvocation),
    Interaction(InteractionInvocation),
}

impl Invocation {
    pub fn actor(&self) -> &Actor {
        match self {
            Self::Command(c) => &c.actor,
            Self::Interaction(i) => &i.actor,
        }
    }

    pub fn responder(&self) -> &Arc<dyn Responder> {
        match self {
            Self::Command(c) => &c.responder,
            Self::Interaction(i) => &i.responder,
        }
    }

    /// Short label for log lines: the command name or the custom id.
    pub fn target(&self) -> &str {
        match self {
            Self::Command(c) => &c.command_name,
            Self::Interaction(i) => &i.custom_id,
        }
    }
}

/// Input handed to a bound feature method.
#[derive(Clone)]
pub enum MethodCall {
    Command(CommandInvocation),
    Interaction(InteractionInvocation),
    Autocomplete(AutocompleteInvocation),
    Event(EventPayload),
    Scheduled,
}

impl MethodCall {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Interaction(_) => "interaction",
            Self::Autocomplete(_) => "autocomplete",
            Self::Event(_) => "event",
            Self::Scheduled => "scheduled",
        }
    }
}

/// What a bound method hands back. Only autocomplete providers return data.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MethodReply {
    #[default]
    Done,
    Choices(Vec<OptionChoice>),
}
