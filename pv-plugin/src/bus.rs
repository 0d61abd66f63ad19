//! Registration event bus
//!
//! Listeners subscribe to an event kind (a string such as `"pgroup"`) and
//! are called synchronously, in subscription order, whenever a payload is
//! published under that kind.
//!
//! `subscribe` hands back a [`Subscription`] guard. Dropping the guard
//! removes the listener, so a subscriber that goes away never leaves a dead
//! callback behind on a bus that outlives it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use tracing::debug;

/// Type-erased listener
type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Listeners<P> {
    next_id: u64,
    by_kind: HashMap<String, Vec<(u64, Callback<P>)>>,
}

impl<P> Listeners<P> {
    fn remove(&mut self, kind: &str, id: u64) {
        if let Some(list) = self.by_kind.get_mut(kind) {
            list.retain(|(other, _)| *other != id);
            if list.is_empty() {
                self.by_kind.remove(kind);
            }
        }
    }
}

/// Publish/subscribe bus keyed by event kind.
///
/// Cloning yields another handle to the same listener table.
pub struct EventBus<P> {
    listeners: Arc<RwLock<Listeners<P>>>,
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self { listeners: Arc::clone(&self.listeners) }
    }
}

impl<P: 'static> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> EventBus<P> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Listeners {
                next_id: 0,
                by_kind: HashMap::new(),
            })),
        }
    }

    /// Subscribe `callback` to events of `kind`.
    ///
    /// The listener stays registered until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, kind: &str, callback: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = {
            let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners
                .by_kind
                .entry(kind.to_string())
                .or_default()
                .push((id, Arc::new(callback)));
            id
        };
        debug!(kind, id, "listener subscribed");

        let weak: Weak<RwLock<Listeners<P>>> = Arc::downgrade(&self.listeners);
        let owned_kind = kind.to_string();
        Subscription {
            kind: kind.to_string(),
            id,
            release: Some(Box::new(move || {
                if let Some(listeners) = weak.upgrade() {
                    listeners
                        .write()
                        .unwrap_or_else(|e| e.into_inner())
                        .remove(&owned_kind, id);
                    debug!(kind = %owned_kind, id, "listener unsubscribed");
                }
            })),
        }
    }

    /// Invoke every listener of `kind` with `payload`, in subscription order.
    /// Returns the number of listeners called.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe or
    /// publish from inside the callback.
    pub fn publish(&self, kind: &str, payload: &P) -> usize {
        let callbacks: Vec<Callback<P>> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_kind
            .get(kind)
            .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        for cb in &callbacks {
            cb(payload);
        }
        callbacks.len()
    }

    /// Number of live listeners for `kind`
    pub fn subscriber_count(&self, kind: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_kind
            .get(kind)
            .map(|list| list.len())
            .unwrap_or(0)
    }
}

/// Scoped listener registration returned by [`EventBus::subscribe`].
///
/// Unsubscribes on drop.
pub struct Subscription {
    kind: String,
    id: u64,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Unsubscribe now. The listener is removed by `Drop`.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
