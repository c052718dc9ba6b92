//! In-process event source.
//!
//! Stands in for the platform gateway's event loop: listeners subscribe by event name
//! and [`EventHub::emit`] delivers a payload to every listener of that name.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::traits::{EventListener, EventSource, ListenerId};
use crate::domain::types::EventPayload;

struct Subscription {
    id: ListenerId,
    once: bool,
    listener: EventListener,
}

#[derive(Clone, Default)]
pub struct EventHub {
    listeners: Arc<RwLock<HashMap<String, Vec<Subscription>>>>,
    next_id: Arc<AtomicU64>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribe(&self, event: &str, listener: EventListener, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Subscription { id, once, listener });
        id
    }

    /// Deliver `payload` to every listener of its event, in subscription order.
    /// One-shot listeners are detached before delivery. Returns the number of listeners reached.
    pub async fn emit(&self, payload: EventPayload) -> usize {
        let targets: Vec<EventListener> = {
            let mut listeners = self.listeners.write();
            let Some(subs) = listeners.get_mut(&payload.name) else {
                tracing::trace!(event = %payload.name, "No listeners for event");
                return 0;
            };
            let targets = subs.iter().map(|s| s.listener.clone()).collect();
            subs.retain(|s| !s.once);
            if subs.is_empty() {
                listeners.remove(&payload.name);
            }
            targets
        };

        let count = targets.len();
        for listener in targets {
            listener(payload.clone()).await;
        }
        count
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }
}

impl EventSource for EventHub {
    fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        self.subscribe(event, listener, false)
    }

    fn once(&self, event: &str, listener: EventListener) -> ListenerId {
        self.subscribe(event, listener, true)
    }

    fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(subs) = listeners.get_mut(event) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            listeners.remove(event);
        }
        removed
    }
}
