//! Publishing events into a meal-plan room.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use mealmate_core::events::Frame;
use mealmate_core::ids::MealPlanId;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::response::ApiError;
use crate::server::AppState;

/// 400 body for a request that is not a `{event, data}` frame.
pub const FRAME_REQUIRED: &str = "event frame is required";

/// POST /api/meal-plans/{mealPlanId}/events
///
/// Publishes the body frame to every connection in the plan's room and
/// answers `{delivered: n}`.
#[instrument(skip_all, fields(plan = %plan))]
pub async fn publish(
    State(state): State<AppState>,
    Path(plan): Path<MealPlanId>,
    body: Result<Json<Frame>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let frame = match body {
        Ok(Json(frame)) if !frame.event.is_empty() => frame,
        Ok(_) => return Err(ApiError::BadRequest(FRAME_REQUIRED)),
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "unreadable event frame");
            return Err(ApiError::BadRequest(FRAME_REQUIRED));
        }
    };
    if frame.known_event().is_none() {
        debug!(event = %frame.event, "publishing unrecognized event");
    }
    let delivered = state.hub.publish(&plan, &frame).await;
    info!(event = %frame.event, delivered, "meal plan event published");
    Ok(Json(json!({ "delivered": delivered })))
}
