//! # Domain Traits
//!
//! Narrow interfaces to the collaborators the runtime does not own: the chat platform
//! (replies, event subscriptions, command sync) and the shared error reporter.
//! Allows for pluggable implementations in the Infrastructure layer.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

use crate::domain::types::{CommandDefinition, EventPayload, Invocation};

/// Reply channel attached to a single invocation.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Send a reply. Ephemeral replies are only visible to the invoking user.
    async fn reply(&self, content: &str, ephemeral: bool) -> Result<(), String>;

    /// Acknowledge the invocation without replying yet.
    async fn defer(&self) -> Result<(), String> {
        Ok(())
    }

    /// Channel the invocation originated from.
    fn channel_id(&self) -> String;
}

/// Callback attached to a platform event.
pub type EventListener = Arc<dyn Fn(EventPayload) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle returned by an [`EventSource`] subscription, used to detach exactly that listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Platform event loop the runtime subscribes to.
pub trait EventSource: Send + Sync {
    fn on(&self, event: &str, listener: EventListener) -> ListenerId;

    /// Subscribe for a single delivery; the source drops the listener after it fires.
    fn once(&self, event: &str, listener: EventListener) -> ListenerId;

    /// Detach a listener. Returns `false` if it was already gone.
    fn off(&self, event: &str, id: ListenerId) -> bool;
}

/// Sink for bulk command registration with the platform.
#[async_trait]
pub trait CommandSync: Send + Sync {
    async fn sync_commands(&self, commands: Vec<CommandDefinition>) -> anyhow::Result<()>;
}

/// Where a handler failure happened.
#[derive(Clone)]
pub struct ErrorContext {
    pub feature: String,
    pub method: String,
    pub invocation: Option<Invocation>,
}

/// Shared collaborator deciding how handler failures are surfaced to users.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, error: &anyhow::Error, context: &ErrorContext);
}
