//! Meal-plan room watcher.
//!
//! Joins the plan's room on creation, forwards status and update events for
//! that plan only, and leaves the room when dropped.

use mealmate_core::events::{MealPlanStatusUpdate, MealPlanUpdate, RealtimeEvent, RoomRequest};
use mealmate_core::ids::MealPlanId;
use tracing::debug;

use crate::connection::RealtimeContext;
use crate::emitter::Emitter;
use crate::subscription::EventSubscription;

/// Live view of one meal plan's events.
#[derive(Debug)]
pub struct MealPlanWatcher {
    plan_id: MealPlanId,
    emitter: Emitter,
    _status: EventSubscription<MealPlanId>,
    _updates: EventSubscription<MealPlanId>,
}

impl MealPlanWatcher {
    /// Start watching `plan_id`.
    ///
    /// The join request is only sent if the connection is ready; call
    /// [`rejoin`](Self::rejoin) after a reconnect.
    pub fn watch<S, U>(ctx: &RealtimeContext, plan_id: MealPlanId, on_status: S, on_update: U) -> Self
    where
        S: Fn(MealPlanStatusUpdate) + Send + Sync + 'static,
        U: Fn(MealPlanUpdate) + Send + Sync + 'static,
    {
        let status_plan = plan_id.clone();
        let status = EventSubscription::mount_typed(
            ctx,
            RealtimeEvent::MealPlanStatus.as_str(),
            move |update: MealPlanStatusUpdate| {
                if update.meal_plan_id == status_plan {
                    on_status(update);
                }
            },
            plan_id.clone(),
        );

        let update_plan = plan_id.clone();
        let updates = EventSubscription::mount_typed(
            ctx,
            RealtimeEvent::MealPlanUpdated.as_str(),
            move |update: MealPlanUpdate| {
                if update.meal_plan_id == update_plan {
                    on_update(update);
                }
            },
            plan_id.clone(),
        );

        let watcher = Self {
            plan_id,
            emitter: Emitter::new(ctx),
            _status: status,
            _updates: updates,
        };
        let _ = watcher.rejoin();
        watcher
    }

    /// Send the join request again. Returns whether it was sent.
    pub fn rejoin(&self) -> bool {
        let sent = self.emitter.emit_typed(
            RealtimeEvent::JoinMealPlan,
            &RoomRequest {
                meal_plan_id: self.plan_id.clone(),
            },
        );
        debug!(plan = %self.plan_id, sent, "join meal plan room");
        sent
    }

    /// Plan being watched.
    pub fn plan_id(&self) -> &MealPlanId {
        &self.plan_id
    }
}

impl Drop for MealPlanWatcher {
    fn drop(&mut self) {
        let _ = self.emitter.emit_typed(
            RealtimeEvent::LeaveMealPlan,
            &RoomRequest {
                meal_plan_id: self.plan_id.clone(),
            },
        );
    }
}
