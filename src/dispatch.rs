//! Named-event publish/subscribe registry.
//!
//! DESIGN
//! ======
//! The registry maps an event name to its listeners in registration order.
//! `publish` snapshots the listener list and releases the lock before
//! invoking anything, so callbacks are free to subscribe or unsubscribe
//! while a delivery is in progress. Each listener carries a liveness flag
//! checked right before it is called; that is what keeps an unsubscribed
//! callback from firing later in the same delivery.
//!
//! ERROR HANDLING
//! ==============
//! A listener that returns `Err` or panics is logged and skipped. Delivery
//! to the remaining listeners continues.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::Value;

/// Error a listener may return. Logged by the dispatcher, never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Callback = dyn Fn(&Value) -> Result<(), ListenerError> + Send + Sync;

struct Listener {
    id: u64,
    live: AtomicBool,
    callback: Box<Callback>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<String, Vec<Arc<Listener>>>,
}

impl Registry {
    fn remove(&mut self, event: &str, id: u64) {
        let Some(list) = self.listeners.get_mut(event) else {
            return;
        };
        list.retain(|l| l.id != id);
        if list.is_empty() {
            self.listeners.remove(event);
        }
    }
}

/// Cloneable handle to a shared listener registry.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `event`. The returned [`Subscription`] is the
    /// only way to remove it again.
    pub fn subscribe<F>(&self, event: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let event = event.into();
        let mut registry = self.lock();
        registry.next_id += 1;
        let listener = Arc::new(Listener {
            id: registry.next_id,
            live: AtomicBool::new(true),
            callback: Box::new(callback),
        });
        registry
            .listeners
            .entry(event.clone())
            .or_default()
            .push(Arc::clone(&listener));

        Subscription { registry: Arc::downgrade(&self.registry), event, listener }
    }

    /// Deliver `payload` to every listener of `event`, in registration order.
    ///
    /// Returns how many listeners completed without error.
    pub fn publish(&self, event: &str, payload: &Value) -> usize {
        let listeners = match self.lock().listeners.get(event) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for listener in listeners {
            if !listener.live.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (listener.callback)(payload))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(event, listener = listener.id, error = %e, "listener failed");
                }
                Err(_) => {
                    tracing::error!(event, listener = listener.id, "listener panicked");
                }
            }
        }
        delivered
    }

    /// Number of live registrations for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().listeners.get(event).map_or(0, Vec::len)
    }

    /// Whether the registry holds an entry for `event` at all.
    #[must_use]
    pub fn has_event(&self, event: &str) -> bool {
        self.lock().listeners.contains_key(event)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Unsubscribe capability returned by [`EventDispatcher::subscribe`].
///
/// Dropping it does not unsubscribe.
#[must_use = "dropping a Subscription leaves the listener registered with no way to remove it"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    event: String,
    listener: Arc<Listener>,
}

impl Subscription {
    /// Remove the listener. Calling this again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.listener.live.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.event, self.listener.id);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.listener.live.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.listener.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
