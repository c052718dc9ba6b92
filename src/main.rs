//! # Main Entry Point
//!
//! Runs the feature runtime against the console gateway:
//! - Domain: configuration
//! - Infrastructure: logging, event hub, console
//! - Application: feature manager
//! - Interface: demo features
//!

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use feature_runtime::application::manager::FeatureManager;
use feature_runtime::application::reporting::LoggingErrorReporter;
use feature_runtime::domain::config::{DEFAULT_CONFIG_PATH, RuntimeConfig};
use feature_runtime::domain::types::{
    Actor, AutocompleteInvocation, CommandInvocation, EventPayload, InteractionInvocation, InteractionKind,
    Permissions,
};
use feature_runtime::infrastructure::console::{self, ConsoleCommandSync, ConsoleInput, ConsoleResponder};
use feature_runtime::infrastructure::event_hub::EventHub;
use feature_runtime::infrastructure::logging;
use feature_runtime::interface::features;

#[derive(Debug, Parser)]
#[command(name = "feature-runtime", about = "Chat-bot feature runtime with a console gateway")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// User id the console acts as.
    #[arg(short, long, default_value = "console")]
    user: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load Configuration
    let config_found = args.config.exists();
    let config = if config_found {
        RuntimeConfig::load(&args.config)?
    } else {
        RuntimeConfig::default()
    };

    // 2. Logging Setup
    let _log_guard = logging::init_tracing(&config.logging)?;
    if !config_found {
        tracing::warn!(path = %args.config.display(), "Config file not found, using defaults");
    }
    tracing::info!("Starting feature runtime...");

    // 3. Runtime
    let hub = Arc::new(EventHub::new());
    let manager = FeatureManager::new(config.clone(), hub.clone(), Arc::new(LoggingErrorReporter));
    features::register_all(&manager, &config.owners)
        .await
        .context("Failed to register features")?;
    manager.sync_commands(&ConsoleCommandSync).await?;

    let permissions = if config.owners.contains(&args.user) {
        Permissions::ADMINISTRATOR
    } else {
        Permissions::SEND_MESSAGES
    };
    let actor = Actor::new(&args.user)
        .in_guild("console")
        .with_permissions(permissions);
    let responder = Arc::new(ConsoleResponder::new("console"));

    hub.emit(EventPayload::new("ready", serde_json::json!({ "user": args.user })))
        .await;

    // 4. Console Loop
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let input = match console::parse_line(&line) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match input {
            ConsoleInput::Quit => break,
            ConsoleInput::Empty => {}
            ConsoleInput::Command { name, options } => {
                let mut invocation = CommandInvocation::new(name, actor.clone(), responder.clone());
                invocation.options = options;
                let outcome = manager.handle_command(invocation).await;
                tracing::debug!(?outcome, "Command dispatched");
            }
            ConsoleInput::Button { custom_id } => {
                let invocation =
                    InteractionInvocation::new(InteractionKind::Button, custom_id, actor.clone(), responder.clone());
                manager.handle_interaction(invocation).await;
            }
            ConsoleInput::Select { custom_id, values } => {
                let mut invocation =
                    InteractionInvocation::new(InteractionKind::Select, custom_id, actor.clone(), responder.clone());
                invocation.values = values;
                manager.handle_interaction(invocation).await;
            }
            ConsoleInput::Modal { custom_id, fields } => {
                let mut invocation =
                    InteractionInvocation::new(InteractionKind::Modal, custom_id, actor.clone(), responder.clone());
                invocation.fields = fields;
                manager.handle_interaction(invocation).await;
            }
            ConsoleInput::Autocomplete { command, option, value } => {
                let choices = manager
                    .handle_autocomplete(AutocompleteInvocation {
                        command_name: command,
                        option_name: option,
                        value,
                        actor: actor.clone(),
                    })
                    .await;
                for choice in choices {
                    println!("  {} => {}", choice.name, choice.value);
                }
            }
            ConsoleInput::Event { name, data } => {
                let delivered = hub.emit(EventPayload::new(name, data)).await;
                tracing::debug!(delivered, "Event emitted");
            }
        }
    }

    // 5. Shutdown
    manager.shutdown().await;
    Ok(())
}
