//! # mealmate-realtime
//!
//! Client-side real-time layer.
//!
//! - [`ConnectionManager`]: single owner of the live WebSocket connection;
//!   idempotent `connect`, `disconnect`, release on drop
//! - [`RealtimeContext`]: cloneable read-only handle handed to everything else
//! - [`EventSubscription`]: event binding with a stable trampoline and a
//!   swappable handler; re-registers only when its dependency value changes
//! - [`Emitter`]: guarded send that logs and returns `false` when not connected
//! - [`MealPlanWatcher`]: joins a meal-plan room and forwards its events
//!
//! ## Crate Position
//!
//! Depends on mealmate-core (wire frame, event vocabulary) and
//! mealmate-settings (connection defaults).

#![deny(unsafe_code)]

pub mod connection;
pub mod emitter;
pub mod errors;
pub mod listeners;
pub mod meal_plan;
pub mod subscription;

#[cfg(test)]
mod test_support;

pub use connection::{
    ConnectionConfig, ConnectionHandle, ConnectionManager, ConnectionState, RealtimeContext,
};
pub use emitter::Emitter;
pub use errors::{RealtimeError, Result};
pub use listeners::{ListenerId, ListenerRegistry};
pub use meal_plan::MealPlanWatcher;
pub use subscription::EventSubscription;
