//! Real-time event vocabulary shared by the hub and the client layer.
//!
//! Every message on the live connection is a JSON text [`Frame`]:
//!
//! ```json
//! { "event": "meal-plan-status", "data": { "mealPlanId": "p1", "status": "generating" } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::MealPlanId;

/// Named events exchanged over the live connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RealtimeEvent {
    /// Server → client: plan generation status changed.
    MealPlanStatus,
    /// Server → client: plan content was created, updated, or deleted.
    MealPlanUpdated,
    /// Client → server: start receiving events for a plan.
    JoinMealPlan,
    /// Client → server: stop receiving events for a plan.
    LeaveMealPlan,
}

impl RealtimeEvent {
    /// All known events.
    pub const ALL: [Self; 4] = [
        Self::MealPlanStatus,
        Self::MealPlanUpdated,
        Self::JoinMealPlan,
        Self::LeaveMealPlan,
    ];

    /// Wire name of the event.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MealPlanStatus => "meal-plan-status",
            Self::MealPlanUpdated => "meal-plan-updated",
            Self::JoinMealPlan => "join-meal-plan",
            Self::LeaveMealPlan => "leave-meal-plan",
        }
    }

    /// Look up an event by wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == name)
    }
}

impl std::fmt::Display for RealtimeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation status of a meal plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// The plan is being generated.
    Generating,
    /// Generation finished successfully.
    Completed,
    /// Generation failed.
    Failed,
}

/// Payload of [`RealtimeEvent::MealPlanStatus`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanStatusUpdate {
    /// Plan the status belongs to.
    pub meal_plan_id: MealPlanId,
    /// New status.
    pub status: PlanStatus,
    /// Optional human-readable detail (e.g. failure reason).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Kind of change carried by [`MealPlanUpdate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// A plan or plan entry was created.
    Created,
    /// A plan or plan entry was modified.
    Updated,
    /// A plan or plan entry was removed.
    Deleted,
}

/// Payload of [`RealtimeEvent::MealPlanUpdated`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanUpdate {
    /// Plan the change belongs to.
    pub meal_plan_id: MealPlanId,
    /// What happened.
    #[serde(rename = "type")]
    pub change: ChangeType,
    /// Changed entity, opaque to the transport.
    #[serde(default)]
    pub data: Value,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
}

/// Payload of [`RealtimeEvent::JoinMealPlan`] and [`RealtimeEvent::LeaveMealPlan`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    /// Plan whose room to join or leave.
    pub meal_plan_id: MealPlanId,
}

/// A single message on the live connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Event name.
    pub event: String,
    /// Event payload; `null` when absent.
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    /// Build a frame from an event name and payload.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Build a frame for a known event from any serializable payload.
    pub fn typed<T: Serialize>(event: RealtimeEvent, payload: &T) -> serde_json::Result<Self> {
        Ok(Self::new(event.as_str(), serde_json::to_value(payload)?))
    }

    /// Serialize to a JSON text message.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a JSON text message.
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// The known event this frame carries, if any.
    pub fn known_event(&self) -> Option<RealtimeEvent> {
        RealtimeEvent::parse(&self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_names_match_wire() {
        assert_eq!(RealtimeEvent::MealPlanStatus.as_str(), "meal-plan-status");
        assert_eq!(RealtimeEvent::MealPlanUpdated.as_str(), "meal-plan-updated");
        assert_eq!(RealtimeEvent::JoinMealPlan.as_str(), "join-meal-plan");
        assert_eq!(RealtimeEvent::LeaveMealPlan.as_str(), "leave-meal-plan");
    }

    #[test]
    fn parse_known_and_unknown() {
        for event in RealtimeEvent::ALL {
            assert_eq!(RealtimeEvent::parse(event.as_str()), Some(event));
        }
        assert_eq!(RealtimeEvent::parse("chat-message"), None);
    }

    #[test]
    fn status_payload_wire_shape() {
        let update = MealPlanStatusUpdate {
            meal_plan_id: "p1".into(),
            status: PlanStatus::Generating,
            message: None,
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value, json!({"mealPlanId": "p1", "status": "generating"}));
    }

    #[test]
    fn update_payload_uses_type_key() {
        let raw = json!({
            "mealPlanId": "p9",
            "type": "deleted",
            "data": {"day": 3},
            "timestamp": "2026-01-05T10:00:00Z"
        });
        let update: MealPlanUpdate = serde_json::from_value(raw).unwrap();
        assert_eq!(update.meal_plan_id.as_str(), "p9");
        assert_eq!(update.change, ChangeType::Deleted);
        assert_eq!(update.data["day"], 3);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let raw = json!({"mealPlanId": "p1", "status": "paused"});
        assert!(serde_json::from_value::<MealPlanStatusUpdate>(raw).is_err());
    }

    #[test]
    fn frame_decode_without_data_defaults_to_null() {
        let frame = Frame::decode(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(frame.event, "ping");
        assert!(frame.data.is_null());
        assert_eq!(frame.known_event(), None);
    }

    #[test]
    fn typed_frame_carries_event_name() {
        let frame = Frame::typed(
            RealtimeEvent::JoinMealPlan,
            &RoomRequest {
                meal_plan_id: "p2".into(),
            },
        )
        .unwrap();
        assert_eq!(frame.known_event(), Some(RealtimeEvent::JoinMealPlan));
        let text = frame.encode().unwrap();
        assert_eq!(text, r#"{"event":"join-meal-plan","data":{"mealPlanId":"p2"}}"#);
    }
}
