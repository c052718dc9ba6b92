//! # Event Dispatcher
//!
//! Attaches feature event handlers to the platform event source. Every attached listener
//! is remembered under `feature:event` together with the id the source handed back, so
//! detaching removes exactly the listeners this dispatcher created.

use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::application::registry::EventRegistration;
use crate::domain::traits::{EventListener, EventSource, ListenerId};
use crate::domain::types::{EventPayload, MethodCall};

pub struct EventDispatcher {
    source: Arc<dyn EventSource>,
    listeners: Mutex<HashMap<String, Vec<(EventRegistration, ListenerId)>>>,
}

impl EventDispatcher {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            listeners: Mutex::new(HashMap::new()),
        }
    }

    fn key(feature: &str, event: &str) -> String {
        format!("{feature}:{event}")
    }

    /// Handler errors are logged inside the listener and never reach the event source.
    fn wrap(registration: &EventRegistration) -> EventListener {
        let handler = registration.handler.clone();
        let feature = registration.feature.clone();
        Arc::new(move |payload: EventPayload| {
            let handler = handler.clone();
            let feature = feature.clone();
            async move {
                let event = payload.name.clone();
                if let Err(e) = handler.invoke(MethodCall::Event(payload)).await {
                    tracing::error!(
                        feature = %feature,
                        method = handler.method(),
                        event = %event,
                        "Event handler failed: {:#}",
                        e
                    );
                }
            }
            .boxed()
        })
    }

    pub fn register_event(&self, registration: EventRegistration) {
        let listener = Self::wrap(&registration);
        let id = if registration.once {
            self.source.once(&registration.event, listener)
        } else {
            self.source.on(&registration.event, listener)
        };
        tracing::debug!(
            feature = %registration.feature,
            event = %registration.event,
            once = registration.once,
            "Attached event listener"
        );
        self.listeners
            .lock()
            .entry(Self::key(&registration.feature, &registration.event))
            .or_default()
            .push((registration, id));
    }

    /// Detach every listener `feature` holds for `event`. Returns how many were tracked.
    pub fn unregister_event(&self, feature: &str, event: &str) -> usize {
        let Some(entries) = self.listeners.lock().remove(&Self::key(feature, event)) else {
            return 0;
        };
        self.detach(entries)
    }

    pub fn unregister_all_feature_events(&self, feature: &str) -> usize {
        let entries: Vec<_> = {
            let mut listeners = self.listeners.lock();
            let keys: Vec<String> = listeners
                .iter()
                .filter(|(_, entries)| entries.iter().any(|(r, _)| r.feature == feature))
                .map(|(k, _)| k.clone())
                .collect();
            keys.iter()
                .filter_map(|k| listeners.remove(k))
                .flatten()
                .collect()
        };
        self.detach(entries)
    }

    // A once-listener that already fired is gone from the source; `off` reports false then.
    fn detach(&self, entries: Vec<(EventRegistration, ListenerId)>) -> usize {
        let count = entries.len();
        for (registration, id) in entries {
            if !self.source.off(&registration.event, id) {
                tracing::trace!(
                    feature = %registration.feature,
                    event = %registration.event,
                    "Listener already detached"
                );
            }
        }
        count
    }

    /// Tracked `feature:event` keys, sorted.
    pub fn registered_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.listeners.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::feature::{BoundHandler, Feature};
    use crate::application::test_support::Recorder;
    use crate::infrastructure::event_hub::EventHub;

    fn registration(feature: &Arc<dyn Feature>, name: &str, event: &str, method: &'static str, once: bool) -> EventRegistration {
        EventRegistration {
            feature: name.into(),
            method,
            event: event.into(),
            once,
            handler: BoundHandler::new(feature.clone(), method),
        }
    }

    fn payload(event: &str) -> EventPayload {
        EventPayload::new(event, serde_json::json!({ "id": 1 }))
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_break_others() {
        let hub = Arc::new(EventHub::new());
        let dispatcher = EventDispatcher::new(hub.clone());
        let (feature, calls) = Recorder::new("alpha");
        let feature: Arc<dyn Feature> = Arc::new(feature);

        dispatcher.register_event(registration(&feature, "alpha", "message", "explode", false));
        dispatcher.register_event(registration(&feature, "alpha", "message", "run", false));

        assert_eq!(hub.emit(payload("message")).await, 2);
        assert_eq!(*calls.lock(), vec!["explode", "run"]);
    }

    #[tokio::test]
    async fn test_once_registration_fires_once() {
        let hub = Arc::new(EventHub::new());
        let dispatcher = EventDispatcher::new(hub.clone());
        let (feature, calls) = Recorder::new("alpha");
        let feature: Arc<dyn Feature> = Arc::new(feature);

        dispatcher.register_event(registration(&feature, "alpha", "ready", "run", true));
        hub.emit(payload("ready")).await;
        hub.emit(payload("ready")).await;
        assert_eq!(calls.lock().len(), 1);

        // Still tracked; detaching a fired once-listener is harmless.
        assert_eq!(dispatcher.unregister_event("alpha", "ready"), 1);
        assert!(dispatcher.registered_keys().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_leaves_foreign_listeners() {
        let hub = Arc::new(EventHub::new());
        let dispatcher = EventDispatcher::new(hub.clone());
        let (alpha, alpha_calls) = Recorder::new("alpha");
        let (beta, beta_calls) = Recorder::new("beta");
        let alpha: Arc<dyn Feature> = Arc::new(alpha);
        let beta: Arc<dyn Feature> = Arc::new(beta);

        dispatcher.register_event(registration(&alpha, "alpha", "message", "run", false));
        dispatcher.register_event(registration(&alpha, "alpha", "join", "other", false));
        dispatcher.register_event(registration(&beta, "beta", "message", "run", false));

        // A subscription made directly on the source, not through the dispatcher.
        let direct = Arc::new(parking_lot::Mutex::new(0));
        let counter = direct.clone();
        hub.on(
            "message",
            Arc::new(move |_: EventPayload| {
                let counter = counter.clone();
                async move { *counter.lock() += 1 }.boxed()
            }),
        );

        assert_eq!(
            dispatcher.registered_keys(),
            vec!["alpha:join", "alpha:message", "beta:message"]
        );
        assert_eq!(dispatcher.unregister_all_feature_events("alpha"), 2);
        assert_eq!(dispatcher.registered_keys(), vec!["beta:message"]);

        hub.emit(payload("message")).await;
        hub.emit(payload("join")).await;
        assert!(alpha_calls.lock().is_empty());
        assert_eq!(*beta_calls.lock(), vec!["run"]);
        assert_eq!(*direct.lock(), 1);
    }
}
