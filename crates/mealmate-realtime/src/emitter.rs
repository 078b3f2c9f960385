//! Guarded emission on the shared connection.

use mealmate_core::events::{Frame, RealtimeEvent};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::connection::RealtimeContext;

/// Sends frames when connected; logs and drops them otherwise.
#[derive(Clone, Debug)]
pub struct Emitter {
    ctx: RealtimeContext,
}

impl Emitter {
    /// Emitter over the given context.
    pub fn new(ctx: &RealtimeContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Forward `{event, data}` verbatim.
    ///
    /// Returns `false` (after a warning) when the connection is absent or
    /// not ready. Never fails because of connection state.
    pub fn emit(&self, event: &str, data: Value) -> bool {
        if !self.ctx.is_connected() {
            warn!(event, "real-time connection not ready, dropping emit");
            return false;
        }
        let text = match Frame::new(event, data).encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(event, error = %e, "failed to encode frame");
                return false;
            }
        };
        if self.ctx.send(text) {
            debug!(event, "emitted");
            true
        } else {
            warn!(event, "real-time connection closed, dropping emit");
            false
        }
    }

    /// Emit a known event with a serializable payload.
    pub fn emit_typed<T: Serialize>(&self, event: RealtimeEvent, payload: &T) -> bool {
        match serde_json::to_value(payload) {
            Ok(data) => self.emit(event.as_str(), data),
            Err(e) => {
                warn!(event = %event, error = %e, "failed to serialize payload");
                false
            }
        }
    }
}
