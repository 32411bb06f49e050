//! Named-event subscriber registry.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use serde_json::Value;

/// Callback invoked with the event payload (if any).
pub(crate) type EventHandler = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

/// Topic -> handlers, in registration order.
///
/// Handlers are cloned out of the lock before they run, so a handler may
/// subscribe further handlers without deadlocking.
#[derive(Clone, Default)]
pub(crate) struct Subscribers {
    handlers: Arc<Mutex<HashMap<String, Vec<EventHandler>>>>,
}

impl Subscribers {
    pub(crate) fn add(&self, event: String, handler: EventHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event)
            .or_default()
            .push(handler);
    }

    /// Run every handler of `event`; returns how many ran.
    pub(crate) fn dispatch(&self, event: &str, data: Option<&Value>) -> usize {
        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            handler(data);
        }
        handlers.len()
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }
}
