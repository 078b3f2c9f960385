//! Per-event listener registry.
//!
//! The registry belongs to the [`ConnectionManager`](crate::ConnectionManager),
//! not to a transport, so registrations survive disconnect and reconnect.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mealmate_core::errors::panic_text;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error};

/// A transport-level listener. Receives the frame payload.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identity of one registration; used to unregister it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Event name → ordered listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<String, Vec<(ListenerId, Listener)>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `event`.
    pub fn on(&self, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners
            .write()
            .entry(event.to_owned())
            .or_default()
            .push((id, listener));
        debug!(event, listener = %id, "listener registered");
        id
    }

    /// Remove a registration. Returns `false` if it was not registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut map = self.listeners.write();
        let Some(list) = map.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(lid, _)| *lid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            let _ = map.remove(event);
        }
        if removed {
            debug!(event, listener = %id, "listener removed");
        }
        removed
    }

    /// Invoke every listener for `event`, in registration order.
    ///
    /// The list is cloned before invoking, so listeners may register or
    /// unregister without deadlocking. A panicking listener is logged and
    /// skipped; the rest still run. Returns the number of listeners called.
    pub fn dispatch(&self, event: &str, data: &Value) -> usize {
        let snapshot: Vec<Listener> = match self.listeners.read().get(event) {
            Some(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };
        for listener in &snapshot {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(data))) {
                error!(
                    event,
                    panic = panic_text(&*payload).unwrap_or("<non-string payload>"),
                    "listener panicked"
                );
            }
        }
        snapshot.len()
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }

    /// Number of listeners across all events.
    pub fn total(&self) -> usize {
        self.listeners.read().values().map(Vec::len).sum()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("total", &self.total())
            .finish_non_exhaustive()
    }
}
