// file: src/router.rs
// description: Subscription registry and event fan-out keyed by event kind

use crate::events::{Event, EventSender, WILDCARD};
use crate::monitoring;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

/// Failure reported by a listener. Never leaves the router.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ListenerError {
    #[error("{0}")]
    Failed(String),

    #[error("listener panicked: {0}")]
    Panicked(String),
}

impl ListenerError {
    pub fn msg(message: impl std::fmt::Display) -> Self {
        ListenerError::Failed(message.to_string())
    }
}

/// A registered callback. Identity for removal is the `Arc` pointer.
pub type Listener = Arc<dyn Fn(&Event) -> Result<(), ListenerError> + Send + Sync>;

/// Wraps a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Event) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Listener that hands every event to a channel consumer, e.g. a UI task.
pub fn forward_to(sender: EventSender) -> Listener {
    listener(move |event| {
        sender
            .try_send(event.clone())
            .map_err(|e| ListenerError::msg(format!("event channel: {}", e)))
    })
}

/// Outcome of one dispatch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that returned `Ok`.
    pub delivered: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
}

impl DispatchReport {
    pub fn invoked(&self) -> usize {
        self.delivered + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Process-wide registry of kind -> listeners.
///
/// [`WILDCARD`] collects listeners that want every inbound event.
///
/// ```text
/// dispatch(Event { kind: "pipeline_started", .. })
///     │
///     ├─ 1. listeners["pipeline_started"]   (registration order)
///     └─ 2. listeners["message"]            (registration order)
/// ```
///
/// A listener that returns an error or panics is logged and counted; the
/// remaining listeners still run. Lifecycle notifications go through
/// [`notify`](Self::notify), which skips the wildcard listeners.
///
/// Listeners are called with the registry unlocked, so a listener may
/// subscribe, unsubscribe or clear while it is being dispatched to. Such
/// changes take effect from the next dispatch.
#[derive(Default)]
pub struct EventRouter {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Listener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `listener` under `kind`. Registering the same listener
    /// twice yields two deliveries. An empty kind is ignored.
    pub fn subscribe(&self, kind: &str, listener: Listener) {
        if kind.is_empty() {
            warn!("Ignoring subscription with an empty event kind");
            return;
        }

        let mut listeners = self.lock();
        let entry = listeners.entry(kind.to_string()).or_default();
        entry.push(listener);
        debug!(kind, count = entry.len(), "Listener subscribed");
    }

    /// Like [`subscribe`](Self::subscribe), but the registration is released
    /// when the returned handle is dropped.
    pub fn subscribe_scoped(self: &Arc<Self>, kind: &str, listener: Listener) -> Subscription {
        self.subscribe(kind, listener.clone());
        Subscription {
            router: Arc::downgrade(self),
            kind: kind.to_string(),
            listener: Some(listener),
        }
    }

    /// Removes the first registration of `listener` under `kind`. Returns
    /// whether anything was removed; removing an unknown listener is a no-op.
    pub fn unsubscribe(&self, kind: &str, listener: &Listener) -> bool {
        let mut listeners = self.lock();
        let Some(entry) = listeners.get_mut(kind) else {
            return false;
        };

        let Some(index) = entry.iter().position(|l| Arc::ptr_eq(l, listener)) else {
            return false;
        };

        entry.remove(index);
        if entry.is_empty() {
            listeners.remove(kind);
        }
        debug!(kind, "Listener unsubscribed");
        true
    }

    /// Delivers an inbound event to the listeners of its kind, then to the
    /// wildcard listeners.
    pub fn dispatch(&self, event: &Event) -> DispatchReport {
        let (specific, wildcard) = {
            let listeners = self.lock();
            let specific = if event.kind == WILDCARD {
                Vec::new()
            } else {
                listeners.get(&event.kind).cloned().unwrap_or_default()
            };
            let wildcard = listeners.get(WILDCARD).cloned().unwrap_or_default();
            (specific, wildcard)
        };

        trace!(
            kind = %event.kind,
            specific = specific.len(),
            wildcard = wildcard.len(),
            "Dispatching event"
        );

        let mut report = DispatchReport::default();
        invoke_all(&event.kind, &specific, event, &mut report);
        invoke_all(WILDCARD, &wildcard, event, &mut report);
        report
    }

    /// Delivers a lifecycle event to the listeners of its own kind only.
    pub fn notify(&self, event: &Event) -> DispatchReport {
        let listeners = self.lock().get(&event.kind).cloned().unwrap_or_default();

        let mut report = DispatchReport::default();
        invoke_all(&event.kind, &listeners, event, &mut report);
        report
    }

    /// Drops every registration.
    pub fn clear(&self) {
        let mut listeners = self.lock();
        let total: usize = listeners.values().map(Vec::len).sum();
        listeners.clear();
        debug!(total, "Cleared all listeners");
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.lock().get(kind).map(Vec::len).unwrap_or(0)
    }

    pub fn has_listeners(&self, kind: &str) -> bool {
        self.listener_count(kind) > 0
    }

    pub fn total_listeners(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }
}

fn invoke_all(key: &str, listeners: &[Listener], event: &Event, report: &mut DispatchReport) {
    for (index, listener) in listeners.iter().enumerate() {
        match invoke(listener, event) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                monitoring::record_listener_failure();
                error!(
                    kind = %event.kind,
                    key,
                    index,
                    "Listener failed: {}",
                    e
                );
            }
        }
    }
}

fn invoke(listener: &Listener, event: &Event) -> Result<(), ListenerError> {
    match catch_unwind(AssertUnwindSafe(|| listener(event))) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(ListenerError::Panicked(message))
        }
    }
}

/// Registration handle returned by [`EventRouter::subscribe_scoped`].
///
/// Dropping it unsubscribes the listener. If the router is gone or was
/// cleared in the meantime, the drop does nothing.
pub struct Subscription {
    router: Weak<EventRouter>,
    kind: String,
    listener: Option<Listener>,
}

impl Subscription {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Releases the registration now instead of at drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(listener) = self.listener.take()
            && let Some(router) = self.router.upgrade()
        {
            router.unsubscribe(&self.kind, &listener);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("active", &self.listener.is_some())
            .finish()
    }
}
