//! # Feature Manager
//!
//! Orchestrates the feature lifecycle: `Registered -> Enabled -> Disabled -> (Enabled | unloaded)`.
//!
//! Registration instantiates a feature, binds its declared records to the instance and runs
//! the load hook. Enabling pushes the bound routes into the dispatch surfaces, rewriting
//! interaction patterns under the feature's custom-id prefix. The keys that were actually
//! registered are remembered per feature, and disabling removes exactly those.
//!
//! Lifecycle operations are serialized; dispatch runs concurrently with them.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::Level;

use crate::application::commands::{CommandHandler, DispatchOutcome};
use crate::application::events::EventDispatcher;
use crate::application::feature::{Feature, FeatureContext};
use crate::application::interactions::InteractionRouter;
use crate::application::logging::FeatureLogger;
use crate::application::rate_limiter::RateLimiter;
use crate::application::registry::{Bindings, MetadataRegistry};
use crate::application::scheduler::SchedulerService;
use crate::domain::config::RuntimeConfig;
use crate::domain::errors::RegistrationError;
use crate::domain::traits::{CommandSync, ErrorReporter, EventSource};
use crate::domain::types::{
    AutocompleteInvocation, CommandDefinition, CommandInvocation, FeatureDescriptor, FeatureState,
    InteractionInvocation, InteractionKind, OptionChoice,
};

/// Snapshot of one feature for introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureInfo {
    pub descriptor: FeatureDescriptor,
    pub state: FeatureState,
}

/// Keys a feature currently holds in the dispatch surfaces.
#[derive(Debug, Default, Clone)]
struct Routes {
    commands: Vec<String>,
    autocompletes: Vec<(String, Option<String>)>,
    interactions: Vec<(InteractionKind, String)>,
    schedulers: Vec<String>,
}

#[derive(Clone)]
struct FeatureEntry {
    descriptor: FeatureDescriptor,
    state: FeatureState,
    instance: Arc<dyn Feature>,
    context: FeatureContext,
    bindings: Bindings,
    routes: Routes,
}

pub struct FeatureManager {
    config: RuntimeConfig,
    registry: MetadataRegistry,
    commands: CommandHandler,
    interactions: InteractionRouter,
    events: EventDispatcher,
    scheduler: SchedulerService,
    outbound: RateLimiter,
    features: Mutex<Vec<FeatureEntry>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl FeatureManager {
    pub fn new(config: RuntimeConfig, source: Arc<dyn EventSource>, reporter: Arc<dyn ErrorReporter>) -> Self {
        let outbound = RateLimiter::new(config.rate_limiter.clone());
        Self {
            registry: MetadataRegistry::new(),
            commands: CommandHandler::new(reporter.clone()),
            interactions: InteractionRouter::new(reporter),
            events: EventDispatcher::new(source),
            scheduler: SchedulerService::new(),
            outbound,
            features: Mutex::new(Vec::new()),
            lifecycle: tokio::sync::Mutex::new(()),
            config,
        }
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    pub fn commands(&self) -> &CommandHandler {
        &self.commands
    }

    pub fn interactions(&self) -> &InteractionRouter {
        &self.interactions
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn scheduler(&self) -> &SchedulerService {
        &self.scheduler
    }

    /// Limiter shared by every feature for outbound calls.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.outbound
    }

    fn entry(&self, name: &str) -> Result<FeatureEntry, RegistrationError> {
        self.features
            .lock()
            .iter()
            .find(|e| e.descriptor.name == name)
            .cloned()
            .ok_or_else(|| RegistrationError::FeatureNotFound(name.to_string()))
    }

    fn update(&self, name: &str, f: impl FnOnce(&mut FeatureEntry)) {
        if let Some(entry) = self.features.lock().iter_mut().find(|e| e.descriptor.name == name) {
            f(entry);
        }
    }

    fn log_level(&self) -> Level {
        self.config.logging.level.parse().unwrap_or(Level::INFO)
    }

    /// Instantiate and register a feature, then enable it unless its descriptor or the
    /// `features.<name>.enabled` config override says otherwise.
    ///
    /// Fails on an empty or duplicate name and when the load hook fails.
    pub async fn register_feature<F, C>(&self, constructor: C) -> Result<FeatureDescriptor, RegistrationError>
    where
        F: Feature,
        C: FnOnce() -> F,
    {
        let _guard = self.lifecycle.lock().await;

        self.registry.declare::<F>();
        let instance = Arc::new(constructor());
        let descriptor = instance.metadata();
        if descriptor.name.trim().is_empty() {
            tracing::error!("Rejected feature without a name");
            return Err(RegistrationError::MissingName);
        }
        if self.entry(&descriptor.name).is_ok() {
            tracing::error!(feature = %descriptor.name, "Rejected duplicate feature");
            return Err(RegistrationError::DuplicateFeature(descriptor.name));
        }

        let overrides = self.config.feature(&descriptor.name);
        let context = FeatureContext {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            settings: overrides.settings,
            logger: FeatureLogger::new(&descriptor.name, &descriptor.version).level(self.log_level()),
            outbound: self.outbound.clone(),
        };
        let bindings = self.registry.bind(instance.clone());

        if let Err(e) = instance.on_load(&context).await {
            tracing::error!(feature = %descriptor.name, "Load hook failed: {:#}", e);
            return Err(RegistrationError::Hook {
                feature: descriptor.name,
                hook: "load",
                message: format!("{e:#}"),
            });
        }

        tracing::info!(
            feature = %descriptor.name,
            version = %descriptor.version,
            commands = bindings.commands.len(),
            interactions = bindings.interactions.len(),
            events = bindings.events.len(),
            schedulers = bindings.schedulers.len(),
            "Feature registered"
        );

        self.features.lock().push(FeatureEntry {
            descriptor: descriptor.clone(),
            state: FeatureState::Registered,
            instance,
            context,
            bindings,
            routes: Routes::default(),
        });

        if overrides.enabled.unwrap_or(descriptor.enabled) {
            self.enable_locked(&descriptor.name).await?;
        } else {
            tracing::info!(feature = %descriptor.name, "Feature left disabled");
        }
        Ok(descriptor)
    }

    /// Run the enable hook and install the feature's routes. No-op when already enabled.
    pub async fn enable_feature(&self, name: &str) -> Result<(), RegistrationError> {
        let _guard = self.lifecycle.lock().await;
        self.enable_locked(name).await
    }

    async fn enable_locked(&self, name: &str) -> Result<(), RegistrationError> {
        let entry = self.entry(name)?;
        if entry.state == FeatureState::Enabled {
            tracing::debug!(feature = %name, "Feature already enabled");
            return Ok(());
        }

        if let Err(e) = entry.instance.on_enable(&entry.context).await {
            tracing::error!(feature = %name, "Enable hook failed: {:#}", e);
        }

        let routes = self.install(&entry.descriptor, &entry.bindings);
        tracing::info!(
            feature = %name,
            commands = routes.commands.len(),
            interactions = routes.interactions.len(),
            schedulers = routes.schedulers.len(),
            "Feature enabled"
        );
        self.update(name, |e| {
            e.state = FeatureState::Enabled;
            e.routes = routes;
        });
        Ok(())
    }

    /// Run the disable hook and remove every route the feature holds. No-op unless enabled.
    pub async fn disable_feature(&self, name: &str) -> Result<(), RegistrationError> {
        let _guard = self.lifecycle.lock().await;
        self.disable_locked(name).await
    }

    async fn disable_locked(&self, name: &str) -> Result<(), RegistrationError> {
        let entry = self.entry(name)?;
        if entry.state != FeatureState::Enabled {
            tracing::debug!(feature = %name, state = ?entry.state, "Feature not enabled");
            return Ok(());
        }

        if let Err(e) = entry.instance.on_disable(&entry.context).await {
            tracing::error!(feature = %name, "Disable hook failed: {:#}", e);
        }

        self.uninstall(name, &entry.routes);
        self.update(name, |e| {
            e.state = FeatureState::Disabled;
            e.routes = Routes::default();
        });
        tracing::info!(feature = %name, "Feature disabled");
        Ok(())
    }

    /// Disable if needed, run the unload hook and forget the feature.
    pub async fn unload_feature(&self, name: &str) -> Result<(), RegistrationError> {
        let _guard = self.lifecycle.lock().await;
        self.unload_locked(name).await
    }

    async fn unload_locked(&self, name: &str) -> Result<(), RegistrationError> {
        self.disable_locked(name).await?;
        let entry = self.entry(name)?;
        if let Err(e) = entry.instance.on_unload(&entry.context).await {
            tracing::error!(feature = %name, "Unload hook failed: {:#}", e);
        }
        self.features.lock().retain(|e| e.descriptor.name != name);
        tracing::info!(feature = %name, "Feature unloaded");
        Ok(())
    }

    /// Stop all schedulers, then disable and unload every feature in registration order.
    /// A failure in one feature never stops the others. Drains the outbound limiter last.
    pub async fn shutdown(&self) {
        let _guard = self.lifecycle.lock().await;
        self.scheduler.stop_all();

        let names: Vec<String> = self
            .features
            .lock()
            .iter()
            .map(|e| e.descriptor.name.clone())
            .collect();
        for name in names {
            if let Err(e) = self.unload_locked(&name).await {
                tracing::error!(feature = %name, "Shutdown of feature failed: {}", e);
            }
        }

        self.outbound.stop().await;
        tracing::info!("Feature runtime shut down");
    }

    fn install(&self, descriptor: &FeatureDescriptor, bindings: &Bindings) -> Routes {
        let feature = descriptor.name.as_str();
        let mut routes = Routes::default();

        for command in &bindings.commands {
            let name = command.metadata.name.clone();
            match self.commands.register_command(command.clone()) {
                Ok(()) => routes.commands.push(name),
                Err(e) => tracing::warn!(feature, "Skipped command: {}", e),
            }
        }

        for provider in &bindings.autocompletes {
            self.commands.register_autocomplete(provider.clone());
            routes
                .autocompletes
                .push((provider.command_name.clone(), provider.option_name.clone()));
        }

        for interaction in &bindings.interactions {
            let mut registration = interaction.clone();
            if let Some(prefix) = &descriptor.custom_id_prefix {
                match interaction.pattern.with_prefix(prefix) {
                    Ok(pattern) => registration.pattern = pattern,
                    Err(source) => {
                        let e = RegistrationError::InvalidPattern {
                            pattern: interaction.pattern.to_string(),
                            source,
                        };
                        tracing::warn!(feature, "Skipped interaction: {}", e);
                        continue;
                    }
                }
            }
            let kind = registration.kind;
            let key = registration.pattern.key().to_string();
            match self.interactions.register_handler(registration) {
                Ok(()) => routes.interactions.push((kind, key)),
                Err(e) => tracing::warn!(feature, "Skipped interaction: {}", e),
            }
        }

        for event in &bindings.events {
            self.events.register_event(event.clone());
        }

        for scheduler in &bindings.schedulers {
            let key = scheduler.key();
            match self.scheduler.register_scheduler(scheduler.clone()) {
                Ok(_) => routes.schedulers.push(key),
                Err(e) => tracing::warn!(feature, "Scheduler not started: {}", e),
            }
        }

        routes
    }

    fn uninstall(&self, feature: &str, routes: &Routes) {
        for name in &routes.commands {
            self.commands.unregister_command(name);
        }
        for (command, option) in &routes.autocompletes {
            self.commands.unregister_autocomplete(command, option.as_deref());
        }
        for (kind, key) in &routes.interactions {
            self.interactions.unregister_handler(*kind, key);
        }
        self.events.unregister_all_feature_events(feature);
        for key in &routes.schedulers {
            self.scheduler.unregister_scheduler(key);
        }
    }

    /// Every feature in registration order.
    pub fn features(&self) -> Vec<FeatureInfo> {
        self.features
            .lock()
            .iter()
            .map(|e| FeatureInfo {
                descriptor: e.descriptor.clone(),
                state: e.state,
            })
            .collect()
    }

    pub fn feature_state(&self, name: &str) -> Option<FeatureState> {
        self.entry(name).ok().map(|e| e.state)
    }

    pub fn get_commands_for_sync(&self) -> Vec<CommandDefinition> {
        self.commands.get_commands_for_sync()
    }

    /// Push the current command definitions to the platform. Returns how many were sent.
    pub async fn sync_commands(&self, sink: &dyn CommandSync) -> anyhow::Result<usize> {
        let definitions = self.get_commands_for_sync();
        let count = definitions.len();
        sink.sync_commands(definitions).await?;
        tracing::info!(count, "Synced commands");
        Ok(count)
    }

    pub async fn handle_command(&self, invocation: CommandInvocation) -> DispatchOutcome {
        self.commands.handle_command(invocation).await
    }

    pub async fn handle_interaction(&self, invocation: InteractionInvocation) -> DispatchOutcome {
        self.interactions.handle_interaction(invocation).await
    }

    pub async fn handle_autocomplete(&self, invocation: AutocompleteInvocation) -> Vec<OptionChoice> {
        self.commands.handle_autocomplete(invocation).await
    }
}
