//! # Metadata Registry
//!
//! Two-phase registration. Phase one records per-method capabilities against a feature
//! type before anything is instantiated. Phase two (`bind`) turns the records of one type
//! into registrations whose handler points at a live instance, keeping only the methods
//! the instance actually exposes.

use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::application::feature::{BoundHandler, Feature};
use crate::application::guards::Guard;
use crate::domain::pattern::InteractionPattern;
use crate::domain::types::{CommandKind, CommandMetadata, InteractionKind};

#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub method: &'static str,
    pub kind: CommandKind,
    pub metadata: CommandMetadata,
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub method: &'static str,
    pub event: String,
    pub once: bool,
}

#[derive(Debug, Clone)]
pub struct InteractionRecord {
    pub method: &'static str,
    pub kind: InteractionKind,
    pub pattern: InteractionPattern,
    pub persistent: bool,
}

/// Trigger settings of a scheduled method. Exactly one of `pattern` and `interval`
/// should be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerOptions {
    /// Cron expression, 5 or 6 fields.
    pub pattern: Option<String>,
    pub interval: Option<Duration>,
    pub run_on_init: bool,
}

impl SchedulerOptions {
    pub fn cron(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Self::default()
        }
    }

    pub fn run_on_init(mut self) -> Self {
        self.run_on_init = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerRecord {
    pub method: &'static str,
    pub options: SchedulerOptions,
}

#[derive(Debug, Clone)]
pub struct AutocompleteRecord {
    pub method: &'static str,
    pub command_name: String,
    /// `None` serves every option of the command.
    pub option_name: Option<String>,
}

#[derive(Default)]
struct TypeRecords {
    commands: Vec<CommandRecord>,
    events: Vec<EventRecord>,
    interactions: Vec<InteractionRecord>,
    schedulers: Vec<SchedulerRecord>,
    autocompletes: Vec<AutocompleteRecord>,
    guards: HashMap<&'static str, Vec<Arc<dyn Guard>>>,
}

#[derive(Clone)]
pub struct CommandRegistration {
    pub feature: String,
    pub method: &'static str,
    pub kind: CommandKind,
    pub metadata: CommandMetadata,
    pub guards: Vec<Arc<dyn Guard>>,
    pub handler: BoundHandler,
}

#[derive(Clone)]
pub struct EventRegistration {
    pub feature: String,
    pub method: &'static str,
    pub event: String,
    pub once: bool,
    pub handler: BoundHandler,
}

#[derive(Clone)]
pub struct InteractionRegistration {
    pub feature: String,
    pub method: &'static str,
    pub kind: InteractionKind,
    pub pattern: InteractionPattern,
    pub persistent: bool,
    pub guards: Vec<Arc<dyn Guard>>,
    pub handler: BoundHandler,
}

#[derive(Clone)]
pub struct SchedulerRegistration {
    pub feature: String,
    pub method: &'static str,
    pub options: SchedulerOptions,
    pub handler: BoundHandler,
}

impl SchedulerRegistration {
    /// `feature.method`
    pub fn key(&self) -> String {
        format!("{}.{}", self.feature, self.method)
    }
}

#[derive(Clone)]
pub struct AutocompleteRegistration {
    pub feature: String,
    pub method: &'static str,
    pub command_name: String,
    pub option_name: Option<String>,
    pub handler: BoundHandler,
}

/// Registrations bound to one feature instance.
#[derive(Clone, Default)]
pub struct Bindings {
    pub commands: Vec<CommandRegistration>,
    pub events: Vec<EventRegistration>,
    pub interactions: Vec<InteractionRegistration>,
    pub schedulers: Vec<SchedulerRegistration>,
    pub autocompletes: Vec<AutocompleteRegistration>,
}

impl Bindings {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
            && self.events.is_empty()
            && self.interactions.is_empty()
            && self.schedulers.is_empty()
            && self.autocompletes.is_empty()
    }
}

/// Store of method-level records, scoped by feature type and keyed by method name.
#[derive(Default)]
pub struct MetadataRegistry {
    types: RwLock<HashMap<TypeId, TypeRecords>>,
    declared: RwLock<HashSet<TypeId>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<R>(&self, owner: TypeId, f: impl FnOnce(&mut TypeRecords) -> R) -> R {
        let mut types = self.types.write();
        f(types.entry(owner).or_default())
    }

    /// Run `F::declare` unless it already ran. Returns `true` on the first call.
    pub fn declare<F: Feature>(&self) -> bool {
        let owner = TypeId::of::<F>();
        if !self.declared.write().insert(owner) {
            return false;
        }
        let mut decl = Declarations {
            registry: self,
            owner,
        };
        F::declare(&mut decl);
        true
    }

    pub fn add_command<F: Feature>(&self, method: &'static str, kind: CommandKind, metadata: CommandMetadata) {
        self.add_command_for(TypeId::of::<F>(), method, kind, metadata);
    }

    pub fn add_event<F: Feature>(&self, method: &'static str, event: impl Into<String>, once: bool) {
        self.add_event_for(TypeId::of::<F>(), method, event.into(), once);
    }

    pub fn add_interaction<F: Feature>(
        &self,
        method: &'static str,
        kind: InteractionKind,
        pattern: InteractionPattern,
        persistent: bool,
    ) {
        self.add_interaction_for(TypeId::of::<F>(), method, kind, pattern, persistent);
    }

    pub fn add_scheduler<F: Feature>(&self, method: &'static str, options: SchedulerOptions) {
        self.add_scheduler_for(TypeId::of::<F>(), method, options);
    }

    pub fn add_autocomplete<F: Feature>(
        &self,
        method: &'static str,
        command_name: impl Into<String>,
        option_name: Option<&str>,
    ) {
        self.add_autocomplete_for(
            TypeId::of::<F>(),
            method,
            command_name.into(),
            option_name.map(str::to_string),
        );
    }

    /// Guards accumulate in attachment order; repeated calls append.
    pub fn add_guards<F: Feature>(&self, method: &'static str, guards: Vec<Arc<dyn Guard>>) {
        self.add_guards_for(TypeId::of::<F>(), method, guards);
    }

    fn add_command_for(&self, owner: TypeId, method: &'static str, kind: CommandKind, metadata: CommandMetadata) {
        self.with_records(owner, |r| {
            r.commands.push(CommandRecord {
                method,
                kind,
                metadata,
            })
        });
    }

    fn add_event_for(&self, owner: TypeId, method: &'static str, event: String, once: bool) {
        self.with_records(owner, |r| r.events.push(EventRecord { method, event, once }));
    }

    fn add_interaction_for(
        &self,
        owner: TypeId,
        method: &'static str,
        kind: InteractionKind,
        pattern: InteractionPattern,
        persistent: bool,
    ) {
        self.with_records(owner, |r| {
            r.interactions.push(InteractionRecord {
                method,
                kind,
                pattern,
                persistent,
            })
        });
    }

    fn add_scheduler_for(&self, owner: TypeId, method: &'static str, options: SchedulerOptions) {
        self.with_records(owner, |r| r.schedulers.push(SchedulerRecord { method, options }));
    }

    fn add_autocomplete_for(
        &self,
        owner: TypeId,
        method: &'static str,
        command_name: String,
        option_name: Option<String>,
    ) {
        self.with_records(owner, |r| {
            r.autocompletes.push(AutocompleteRecord {
                method,
                command_name,
                option_name,
            })
        });
    }

    fn add_guards_for(&self, owner: TypeId, method: &'static str, guards: Vec<Arc<dyn Guard>>) {
        self.with_records(owner, |r| r.guards.entry(method).or_default().extend(guards));
    }

    /// Bind the records of `F` to a live instance.
    ///
    /// Only methods listed by `instance.methods()` survive; everything else is dropped
    /// silently. Never fails, the result may be empty.
    pub fn bind<F: Feature>(&self, instance: Arc<F>) -> Bindings {
        let feature = instance.metadata().name;
        let exposed: HashSet<&str> = instance.methods().iter().copied().collect();
        let live: Arc<dyn Feature> = instance;

        let types = self.types.read();
        let Some(records) = types.get(&TypeId::of::<F>()) else {
            return Bindings::default();
        };

        let handler = |method: &'static str| BoundHandler::new(live.clone(), method);
        let guards = |method: &'static str| records.guards.get(method).cloned().unwrap_or_default();

        Bindings {
            commands: records
                .commands
                .iter()
                .filter(|r| exposed.contains(r.method))
                .map(|r| CommandRegistration {
                    feature: feature.clone(),
                    method: r.method,
                    kind: r.kind,
                    metadata: r.metadata.clone(),
                    guards: guards(r.method),
                    handler: handler(r.method),
                })
                .collect(),
            events: records
                .events
                .iter()
                .filter(|r| exposed.contains(r.method))
                .map(|r| EventRegistration {
                    feature: feature.clone(),
                    method: r.method,
                    event: r.event.clone(),
                    once: r.once,
                    handler: handler(r.method),
                })
                .collect(),
            interactions: records
                .interactions
                .iter()
                .filter(|r| exposed.contains(r.method))
                .map(|r| InteractionRegistration {
                    feature: feature.clone(),
                    method: r.method,
                    kind: r.kind,
                    pattern: r.pattern.clone(),
                    persistent: r.persistent,
                    guards: guards(r.method),
                    handler: handler(r.method),
                })
                .collect(),
            schedulers: records
                .schedulers
                .iter()
                .filter(|r| exposed.contains(r.method))
                .map(|r| SchedulerRegistration {
                    feature: feature.clone(),
                    method: r.method,
                    options: r.options.clone(),
                    handler: handler(r.method),
                })
                .collect(),
            autocompletes: records
                .autocompletes
                .iter()
                .filter(|r| exposed.contains(r.method))
                .map(|r| AutocompleteRegistration {
                    feature: feature.clone(),
                    method: r.method,
                    command_name: r.command_name.clone(),
                    option_name: r.option_name.clone(),
                    handler: handler(r.method),
                })
                .collect(),
        }
    }
}

/// Declaration surface passed to [`Feature::declare`], fixed to one feature type.
pub struct Declarations<'a> {
    registry: &'a MetadataRegistry,
    owner: TypeId,
}

impl Declarations<'_> {
    pub fn command(&mut self, method: &'static str, metadata: CommandMetadata) -> &mut Self {
        self.registry
            .add_command_for(self.owner, method, CommandKind::Slash, metadata);
        self
    }

    pub fn user_command(&mut self, method: &'static str, name: &str) -> &mut Self {
        self.registry.add_command_for(
            self.owner,
            method,
            CommandKind::User,
            CommandMetadata::new(name, ""),
        );
        self
    }

    pub fn message_command(&mut self, method: &'static str, name: &str) -> &mut Self {
        self.registry.add_command_for(
            self.owner,
            method,
            CommandKind::Message,
            CommandMetadata::new(name, ""),
        );
        self
    }

    pub fn on(&mut self, method: &'static str, event: &str) -> &mut Self {
        self.registry
            .add_event_for(self.owner, method, event.to_string(), false);
        self
    }

    pub fn once(&mut self, method: &'static str, event: &str) -> &mut Self {
        self.registry
            .add_event_for(self.owner, method, event.to_string(), true);
        self
    }

    pub fn interaction(
        &mut self,
        method: &'static str,
        kind: InteractionKind,
        pattern: InteractionPattern,
        persistent: bool,
    ) -> &mut Self {
        self.registry
            .add_interaction_for(self.owner, method, kind, pattern, persistent);
        self
    }

    pub fn button(&mut self, method: &'static str, pattern: InteractionPattern) -> &mut Self {
        self.interaction(method, InteractionKind::Button, pattern, true)
    }

    pub fn select(&mut self, method: &'static str, pattern: InteractionPattern) -> &mut Self {
        self.interaction(method, InteractionKind::Select, pattern, true)
    }

    pub fn modal(&mut self, method: &'static str, pattern: InteractionPattern) -> &mut Self {
        self.interaction(method, InteractionKind::Modal, pattern, true)
    }

    pub fn schedule(&mut self, method: &'static str, options: SchedulerOptions) -> &mut Self {
        self.registry.add_scheduler_for(self.owner, method, options);
        self
    }

    pub fn autocomplete(
        &mut self,
        method: &'static str,
        command_name: &str,
        option_name: Option<&str>,
    ) -> &mut Self {
        self.registry.add_autocomplete_for(
            self.owner,
            method,
            command_name.to_string(),
            option_name.map(str::to_string),
        );
        self
    }

    pub fn guard(&mut self, method: &'static str, guard: Arc<dyn Guard>) -> &mut Self {
        self.registry.add_guards_for(self.owner, method, vec![guard]);
        self
    }
}
