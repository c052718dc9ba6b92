//! # Command Handler
//!
//! Routes incoming slash and context-menu commands to the registered feature method.
//! Resolves the registration by name, runs its guard chain, then invokes the handler.
//! Also serves autocomplete requests and produces the definitions for platform sync.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::application::guards::{GuardContext, GuardExecutor};
use crate::application::registry::{AutocompleteRegistration, CommandRegistration};
use crate::domain::errors::RegistrationError;
use crate::domain::traits::{ErrorContext, ErrorReporter};
use crate::domain::types::{
    AutocompleteInvocation, CommandDefinition, CommandInvocation, Invocation, MethodCall, MethodReply,
    OptionChoice,
};

/// Platform cap on suggestions per autocomplete response.
pub const MAX_SUGGESTIONS: usize = 25;

const DEFAULT_OPTION_KEY: &str = "default";

/// How a dispatched invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// No registration matched; nothing ran.
    NotFound,
    /// A guard rejected the invocation and produced its own feedback.
    GuardRejected,
    /// The handler returned an error, which went to the error reporter.
    Failed,
}

pub struct CommandHandler {
    commands: RwLock<HashMap<String, CommandRegistration>>,
    autocompletes: RwLock<HashMap<String, AutocompleteRegistration>>,
    reporter: Arc<dyn ErrorReporter>,
}

impl CommandHandler {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
            autocompletes: RwLock::new(HashMap::new()),
            reporter,
        }
    }

    /// `command:option`, or `command:default` for providers serving every option.
    pub fn autocomplete_key(command_name: &str, option_name: Option<&str>) -> String {
        format!("{}:{}", command_name, option_name.unwrap_or(DEFAULT_OPTION_KEY))
    }

    pub fn register_command(&self, registration: CommandRegistration) -> Result<(), RegistrationError> {
        let mut commands = self.commands.write();
        let name = registration.metadata.name.clone();
        if commands.contains_key(&name) {
            return Err(RegistrationError::DuplicateCommand(name));
        }
        tracing::debug!(command = %name, feature = %registration.feature, "Registered command");
        commands.insert(name, registration);
        Ok(())
    }

    pub fn unregister_command(&self, name: &str) -> Option<CommandRegistration> {
        self.commands.write().remove(name)
    }

    /// Replaces any provider already registered under the same key.
    pub fn register_autocomplete(&self, registration: AutocompleteRegistration) {
        let key = Self::autocomplete_key(&registration.command_name, registration.option_name.as_deref());
        if let Some(previous) = self.autocompletes.write().insert(key.clone(), registration) {
            tracing::warn!(key = %key, previous = %previous.feature, "Replaced autocomplete provider");
        }
    }

    pub fn unregister_autocomplete(&self, command_name: &str, option_name: Option<&str>) -> bool {
        self.autocompletes
            .write()
            .remove(&Self::autocomplete_key(command_name, option_name))
            .is_some()
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.read().contains_key(name)
    }

    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.commands.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn autocomplete_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.autocompletes.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn handle_command(&self, invocation: CommandInvocation) -> DispatchOutcome {
        let Some(registration) = self.commands.read().get(&invocation.command_name).cloned() else {
            tracing::debug!(command = %invocation.command_name, "No handler for command, dropping");
            return DispatchOutcome::NotFound;
        };

        tracing::info!(
            command = %invocation.command_name,
            feature = %registration.feature,
            user = %invocation.actor.user_id,
            "Dispatching command"
        );

        let ctx = GuardContext {
            invocation: Invocation::Command(invocation.clone()),
            feature: registration.feature.clone(),
            method: registration.method.to_string(),
        };
        if !GuardExecutor::execute(&registration.guards, &ctx).await {
            return DispatchOutcome::GuardRejected;
        }

        match registration.handler.invoke(MethodCall::Command(invocation)).await {
            Ok(_) => DispatchOutcome::Handled,
            Err(e) => {
                let context = ErrorContext {
                    feature: ctx.feature,
                    method: ctx.method,
                    invocation: Some(ctx.invocation),
                };
                self.reporter.report(&e, &context).await;
                DispatchOutcome::Failed
            }
        }
    }

    /// Suggestions for the focused option. Misses and handler errors yield an empty list.
    pub async fn handle_autocomplete(&self, invocation: AutocompleteInvocation) -> Vec<OptionChoice> {
        let registration = {
            let autocompletes = self.autocompletes.read();
            autocompletes
                .get(&Self::autocomplete_key(&invocation.command_name, Some(&invocation.option_name)))
                .or_else(|| autocompletes.get(&Self::autocomplete_key(&invocation.command_name, None)))
                .cloned()
        };
        let Some(registration) = registration else {
            tracing::debug!(
                command = %invocation.command_name,
                option = %invocation.option_name,
                "No autocomplete provider"
            );
            return Vec::new();
        };

        let command = invocation.command_name.clone();
        match registration.handler.invoke(MethodCall::Autocomplete(invocation)).await {
            Ok(MethodReply::Choices(mut choices)) => {
                choices.truncate(MAX_SUGGESTIONS);
                choices
            }
            Ok(MethodReply::Done) => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    command = %command,
                    feature = %registration.feature,
                    "Autocomplete provider failed: {:#}",
                    e
                );
                Vec::new()
            }
        }
    }

    /// Definitions of every registered command, sorted by name. Pure read.
    pub fn get_commands_for_sync(&self) -> Vec<CommandDefinition> {
        let mut definitions: Vec<_> = self
            .commands
            .read()
            .values()
            .map(|r| CommandDefinition::from_metadata(r.kind, &r.metadata))
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }
}
