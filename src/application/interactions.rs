//! # Interaction Router
//!
//! Routes button presses, select-menu choices and modal submissions by custom id.
//! Each interaction kind has its own table, so the same id may be used by a button
//! and a modal without conflict.
//!
//! Resolution: an exact literal match wins, otherwise the first matching rule in
//! insertion order. Unmatched interactions are dropped.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::application::commands::DispatchOutcome;
use crate::application::guards::{GuardContext, GuardExecutor};
use crate::application::registry::InteractionRegistration;
use crate::domain::errors::RegistrationError;
use crate::domain::traits::{ErrorContext, ErrorReporter};
use crate::domain::types::{InteractionInvocation, InteractionKind, Invocation, MethodCall};

#[derive(Default)]
struct PatternTable {
    literals: HashMap<String, InteractionRegistration>,
    rules: Vec<InteractionRegistration>,
}

impl PatternTable {
    fn contains(&self, registration: &InteractionRegistration) -> bool {
        let key = registration.pattern.key();
        if registration.pattern.is_literal() {
            self.literals.contains_key(key)
        } else {
            self.rules.iter().any(|r| r.pattern.key() == key)
        }
    }

    fn insert(&mut self, registration: InteractionRegistration) {
        if registration.pattern.is_literal() {
            self.literals
                .insert(registration.pattern.key().to_string(), registration);
        } else {
            self.rules.push(registration);
        }
    }

    /// Removes a literal or a rule by its key. Literals are checked first.
    fn remove(&mut self, key: &str) -> Option<InteractionRegistration> {
        if let Some(found) = self.literals.remove(key) {
            return Some(found);
        }
        let index = self.rules.iter().position(|r| r.pattern.key() == key)?;
        Some(self.rules.remove(index))
    }

    fn resolve(&self, custom_id: &str) -> Option<&InteractionRegistration> {
        self.literals
            .get(custom_id)
            .or_else(|| self.rules.iter().find(|r| r.pattern.matches(custom_id)))
    }

    fn len(&self) -> usize {
        self.literals.len() + self.rules.len()
    }
}

pub struct InteractionRouter {
    tables: RwLock<HashMap<InteractionKind, PatternTable>>,
    reporter: Arc<dyn ErrorReporter>,
}

impl InteractionRouter {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            reporter,
        }
    }

    pub fn register_handler(&self, registration: InteractionRegistration) -> Result<(), RegistrationError> {
        let mut tables = self.tables.write();
        let table = tables.entry(registration.kind).or_default();
        if table.contains(&registration) {
            return Err(RegistrationError::DuplicateInteraction {
                kind: registration.kind,
                pattern: registration.pattern.to_string(),
            });
        }
        tracing::debug!(
            kind = %registration.kind,
            pattern = %registration.pattern,
            feature = %registration.feature,
            "Registered interaction handler"
        );
        table.insert(registration);
        Ok(())
    }

    /// Remove the registration stored under `key` (literal text or rule source).
    pub fn unregister_handler(&self, kind: InteractionKind, key: &str) -> Option<InteractionRegistration> {
        self.tables.write().get_mut(&kind)?.remove(key)
    }

    pub fn resolve(&self, kind: InteractionKind, custom_id: &str) -> Option<InteractionRegistration> {
        self.tables.read().get(&kind)?.resolve(custom_id).cloned()
    }

    pub fn len(&self, kind: InteractionKind) -> usize {
        self.tables.read().get(&kind).map_or(0, PatternTable::len)
    }

    pub async fn handle_interaction(&self, invocation: InteractionInvocation) -> DispatchOutcome {
        let Some(registration) = self.resolve(invocation.kind, &invocation.custom_id) else {
            tracing::debug!(
                kind = %invocation.kind,
                custom_id = %invocation.custom_id,
                "No handler for interaction, dropping"
            );
            return DispatchOutcome::NotFound;
        };

        tracing::info!(
            kind = %invocation.kind,
            custom_id = %invocation.custom_id,
            feature = %registration.feature,
            user = %invocation.actor.user_id,
            "Dispatching interaction"
        );

        let ctx = GuardContext {
            invocation: Invocation::Interaction(invocation.clone()),
            feature: registration.feature.clone(),
            method: registration.method.to_string(),
        };
        if !GuardExecutor::execute(&registration.guards, &ctx).await {
            return DispatchOutcome::GuardRejected;
        }

        match registration.handler.invoke(MethodCall::Interaction(invocation)).await {
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
}
