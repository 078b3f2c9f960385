//! Event subscriptions bound to an owner's lifetime.
//!
//! The registry holds a stable trampoline that reads the current handler
//! from a shared cell. Replacing the handler only swaps the cell; the
//! registration is redone only when the caller's dependency value changes.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::connection::RealtimeContext;
use crate::listeners::{Listener, ListenerId};

/// Handler invoked with the raw frame payload.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

type HandlerCell = Arc<RwLock<Handler>>;

/// One event binding, unregistered on drop.
///
/// `D` is the dependency value; a change in it forces exactly one
/// unregister followed by one register.
pub struct EventSubscription<D: PartialEq = ()> {
    ctx: RealtimeContext,
    event: String,
    cell: HandlerCell,
    deps: D,
    listener: ListenerId,
}

impl<D: PartialEq> EventSubscription<D> {
    /// Register `handler` for `event`.
    pub fn mount<F>(ctx: &RealtimeContext, event: impl Into<String>, handler: F, deps: D) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let event = event.into();
        let cell: HandlerCell = Arc::new(RwLock::new(Arc::new(handler)));
        let listener = ctx.on(&event, trampoline(&cell));
        Self {
            ctx: ctx.clone(),
            event,
            cell,
            deps,
            listener,
        }
    }

    /// Register a handler that receives the payload decoded as `T`.
    ///
    /// Payloads that fail to decode are logged and skipped.
    pub fn mount_typed<T, F>(
        ctx: &RealtimeContext,
        event: impl Into<String>,
        handler: F,
        deps: D,
    ) -> Self
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let event = event.into();
        let typed = decoding(event.clone(), handler);
        Self::mount(ctx, event, typed, deps)
    }

    /// Swap in the latest handler and apply the latest dependency value.
    pub fn render<F>(&mut self, handler: F, deps: D)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        *self.cell.write() = Arc::new(handler);
        if deps != self.deps {
            let _ = self.ctx.off(&self.event, self.listener);
            self.listener = self.ctx.on(&self.event, trampoline(&self.cell));
            self.deps = deps;
        }
    }

    /// [`render`](Self::render) with a typed handler.
    pub fn render_typed<T, F>(&mut self, handler: F, deps: D)
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let typed = decoding(self.event.clone(), handler);
        self.render(typed, deps);
    }

    /// Event this subscription listens to.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Current registration.
    pub fn listener_id(&self) -> ListenerId {
        self.listener
    }

    /// Current dependency value.
    pub fn deps(&self) -> &D {
        &self.deps
    }
}

impl<D: PartialEq> Drop for EventSubscription<D> {
    fn drop(&mut self) {
        let _ = self.ctx.off(&self.event, self.listener);
    }
}

impl<D: PartialEq> fmt::Debug for EventSubscription<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription")
            .field("event", &self.event)
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

fn trampoline(cell: &HandlerCell) -> Listener {
    let cell = Arc::clone(cell);
    Arc::new(move |data: &Value| {
        let handler = Arc::clone(&*cell.read());
        handler(data);
    })
}

fn decoding<T, F>(event: String, handler: F) -> impl Fn(&Value) + Send + Sync + 'static
where
    T: DeserializeOwned,
    F: Fn(T) + Send + Sync + 'static,
{
    move |data: &Value| match serde_json::from_value::<T>(data.clone()) {
        Ok(payload) => handler(payload),
        Err(e) => warn!(event = %event, error = %e, "dropping payload that failed to decode"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mealmate_core::events::{MealPlanStatusUpdate, PlanStatus};
    use mealmate_core::logging::capture_logs;
    use serde_json::json;
    use tracing::Level;

    use super::*;
    use crate::connection::{ConnectionConfig, ConnectionManager};

    fn manager() -> ConnectionManager {
        ConnectionManager::new(ConnectionConfig::new("ws://127.0.0.1:1/ws"))
    }

    /// Deliver a payload the way the transport task does.
    fn fire(ctx: &RealtimeContext, event: &str, data: &Value) -> usize {
        ctx.dispatch(event, data)
    }

    fn count_messages(logs: &mealmate_core::logging::CapturedLogs, text: &str) -> usize {
        logs.events()
            .iter()
            .filter(|e| e.message.contains(text))
            .count()
    }

    #[test]
    fn mount_registers_once_even_while_disconnected() {
        let manager = manager();
        let ctx = manager.context();
        let _sub = EventSubscription::mount(&ctx, "meal-plan-status", |_| {}, ());
        assert!(!ctx.is_connected());
        assert_eq!(ctx.listener_count("meal-plan-status"), 1);
    }

    #[test]
    fn render_with_same_deps_swaps_handler_without_churn() {
        let manager = manager();
        let ctx = manager.context();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&first);
        let mut sub = EventSubscription::mount(
            &ctx,
            "e",
            move |_| {
                let _ = f.fetch_add(1, Ordering::SeqCst);
            },
            1_u32,
        );
        let before = sub.listener_id();

        let s = Arc::clone(&second);
        sub.render(
            move |_| {
                let _ = s.fetch_add(1, Ordering::SeqCst);
            },
            1,
        );

        assert_eq!(sub.listener_id(), before);
        assert_eq!(fire(&ctx, "e", &Value::Null), 1);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_renders_deliver_once_per_event() {
        let manager = manager();
        let ctx = manager.context();
        let hits = Arc::new(AtomicUsize::new(0));

        let make = |hits: &Arc<AtomicUsize>| {
            let hits = Arc::clone(hits);
            move |_: &Value| {
                let _ = hits.fetch_add(1, Ordering::SeqCst);
            }
        };
        let mut sub = EventSubscription::mount(&ctx, "e", make(&hits), ());
        for _ in 0..5 {
            sub.render(make(&hits), ());
        }

        let _ = fire(&ctx, "e", &Value::Null);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn changed_deps_reregister_exactly_once() {
        let manager = manager();
        let ctx = manager.context();
        let (logs, _guard) = capture_logs();

        let mut sub = EventSubscription::mount(&ctx, "e", |_| {}, "plan-1");
        let before = sub.listener_id();
        logs.clear();

        sub.render(|_| {}, "plan-2");

        assert_ne!(sub.listener_id(), before);
        assert_eq!(*sub.deps(), "plan-2");
        assert_eq!(ctx.listener_count("e"), 1);
        assert_eq!(count_messages(&logs, "listener removed"), 1);
        assert_eq!(count_messages(&logs, "listener registered"), 1);

        let events = logs.events();
        let removed = events
            .iter()
            .position(|e| e.message.contains("listener removed"));
        let registered = events
            .iter()
            .position(|e| e.message.contains("listener registered"));
        assert!(removed < registered);
    }

    #[test]
    fn drop_unregisters() {
        let manager = manager();
        let ctx = manager.context();
        let sub = EventSubscription::mount(&ctx, "e", |_| {}, ());
        assert_eq!(ctx.listener_count("e"), 1);
        drop(sub);
        assert_eq!(ctx.listener_count("e"), 0);
    }

    #[test]
    fn typed_handler_decodes_payload() {
        let manager = manager();
        let ctx = manager.context();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        let _sub = EventSubscription::mount_typed(
            &ctx,
            "meal-plan-status",
            move |update: MealPlanStatusUpdate| s.lock().push(update.status),
            (),
        );

        let _ = fire(
            &ctx,
            "meal-plan-status",
            &json!({"mealPlanId": "p1", "status": "completed"}),
        );
        assert_eq!(*seen.lock(), vec![PlanStatus::Completed]);
    }

    #[test]
    fn typed_handler_skips_bad_payload_with_warning() {
        let manager = manager();
        let ctx = manager.context();
        let (logs, _guard) = capture_logs();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let _sub = EventSubscription::mount_typed(
            &ctx,
            "meal-plan-status",
            move |_: MealPlanStatusUpdate| {
                let _ = h.fetch_add(1, Ordering::SeqCst);
            },
            (),
        );

        let _ = fire(&ctx, "meal-plan-status", &json!({"status": 7}));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(logs.has_event(Level::WARN, "failed to decode"));
    }

    #[test]
    fn bindings_outlive_the_manager_scope_until_dropped() {
        let manager = manager();
        let ctx = manager.context();
        let sub = EventSubscription::mount(&ctx, "e", |_| {}, ());
        drop(manager);
        assert_eq!(ctx.listener_count("e"), 1);
        drop(sub);
        assert_eq!(ctx.listener_count("e"), 0);
    }
}
