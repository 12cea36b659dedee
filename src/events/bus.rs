//! In-process publish/subscribe registry for data-change events

use super::{DataEvent, EventKind};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error};

type Callback = Arc<dyn Fn(&DataEvent) + Send + Sync>;

/// Identifies one registration on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    callback: Callback,
    once: bool,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<Listener>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn remove_listener(registry: &Mutex<Registry>, kind: EventKind, id: ListenerId) -> bool {
    let mut registry = lock(registry);
    let Some(listeners) = registry.listeners.get_mut(&kind) else {
        return false;
    };
    let before = listeners.len();
    listeners.retain(|l| l.id != id);
    let removed = listeners.len() != before;
    if listeners.is_empty() {
        registry.listeners.remove(&kind);
    }
    removed
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Event bus shared by every component that produces or consumes
/// [`DataEvent`]s.
///
/// Cloning is cheap and clones share one registry. Emission is synchronous:
/// callbacks run on the emitting thread, in registration order, with the
/// registry unlocked, so a callback may itself emit or unsubscribe.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every event of `kind`
    pub fn on<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&DataEvent) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(callback), false)
    }

    /// Register `callback` for the next event of `kind` only
    pub fn once<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&DataEvent) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(callback), true)
    }

    fn register(&self, kind: EventKind, callback: Callback, once: bool) -> Subscription {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.listeners.entry(kind).or_default().push(Listener {
            id,
            callback,
            once,
        });
        debug!(event = ?kind, listener = id.0, once, "Listener registered");

        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Remove one registration. Returns `false` if it was already gone.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        remove_listener(&self.registry, kind, id)
    }

    /// Deliver `event` to every listener currently registered for its kind.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event: DataEvent) -> usize {
        let kind = event.kind();

        let targets: Vec<(ListenerId, Callback)> = {
            let mut registry = lock(&self.registry);
            let Some(listeners) = registry.listeners.get_mut(&kind) else {
                debug!(event = ?kind, "No listeners, event dropped");
                return 0;
            };
            let targets = listeners
                .iter()
                .map(|l| (l.id, l.callback.clone()))
                .collect();
            listeners.retain(|l| !l.once);
            if listeners.is_empty() {
                registry.listeners.remove(&kind);
            }
            targets
        };

        for (id, callback) in &targets {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                error!(
                    event = ?kind,
                    listener = id.0,
                    "Event listener panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }

        debug!(event = ?kind, listeners = targets.len(), "Event emitted");
        targets.len()
    }

    /// Number of listeners registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        lock(&self.registry)
            .listeners
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Register `callback` for several kinds at once, for as long as the
    /// returned [`Watch`] is alive.
    pub fn watch<F>(&self, kinds: &[EventKind], callback: F) -> Watch
    where
        F: Fn(&DataEvent) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let subscriptions = kinds
            .iter()
            .map(|kind| self.register(*kind, callback.clone(), false))
            .collect();
        Watch { subscriptions }
    }
}

/// Handle to one registration, returned by [`EventBus::on`] and
/// [`EventBus::once`].
///
/// Dropping it leaves the listener in place; call [`unsubscribe`] to remove
/// it, or use [`EventBus::watch`] for drop-scoped registrations.
///
/// [`unsubscribe`]: Subscription::unsubscribe
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    kind: EventKind,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the listener. `false` if it was already removed or the bus is gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => remove_listener(&registry, self.kind, self.id),
            None => false,
        }
    }
}

/// Scope guard over a set of registrations; every one is removed on drop.
pub struct Watch {
    subscriptions: Vec<Subscription>,
}

impl Watch {
    pub fn kinds(&self) -> Vec<EventKind> {
        self.subscriptions.iter().map(Subscription::kind).collect()
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}
