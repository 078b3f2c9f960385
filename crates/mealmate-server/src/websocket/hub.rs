//! Connection registry and meal-plan rooms.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use mealmate_core::events::Frame;
use mealmate_core::ids::{ConnectionId, MealPlanId};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    rooms: HashMap<MealPlanId, HashSet<ConnectionId>>,
}

/// Totals reported by `/health`, read under one lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Live `/ws` connections.
    pub connections: usize,
    /// Non-empty meal-plan rooms.
    pub rooms: usize,
    /// Room memberships summed over all rooms.
    pub memberships: usize,
    /// Frames dropped because a client's send queue was full.
    pub dropped_frames: u64,
}

/// Fans frames out to the members of a meal-plan room.
#[derive(Default)]
pub struct RoomHub {
    inner: RwLock<Inner>,
}

impl RoomHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut inner = self.inner.write().await;
        let _ = inner.connections.insert(connection.id.clone(), connection);
    }

    /// Forget a connection and remove it from every room.
    pub async fn remove(&self, id: &ConnectionId) {
        let mut inner = self.inner.write().await;
        let _ = inner.connections.remove(id);
        inner.rooms.retain(|_, members| {
            let _ = members.remove(id);
            !members.is_empty()
        });
    }

    /// Add a connection to a room. `false` if the connection is unknown.
    pub async fn join(&self, id: &ConnectionId, plan: MealPlanId) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.connections.contains_key(id) {
            return false;
        }
        debug!(conn_id = %id, plan = %plan, "joined meal plan room");
        let _ = inner.rooms.entry(plan).or_default().insert(id.clone());
        true
    }

    /// Remove a connection from a room. `false` if it was not a member.
    pub async fn leave(&self, id: &ConnectionId, plan: &MealPlanId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(members) = inner.rooms.get_mut(plan) else {
            return false;
        };
        let removed = members.remove(id);
        if members.is_empty() {
            let _ = inner.rooms.remove(plan);
        }
        if removed {
            debug!(conn_id = %id, plan = %plan, "left meal plan room");
        }
        removed
    }

    /// Send a frame to every member of `plan`'s room. Returns how many
    /// members accepted it.
    pub async fn publish(&self, plan: &MealPlanId, frame: &Frame) -> usize {
        let json = match frame.encode() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event = %frame.event, error = %e, "failed to serialize frame");
                return 0;
            }
        };
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(plan) else {
            debug!(event = %frame.event, plan = %plan, "no room members");
            return 0;
        };
        let mut delivered = 0;
        for id in members {
            let Some(conn) = inner.connections.get(id) else {
                continue;
            };
            if conn.send(Arc::clone(&json)) {
                delivered += 1;
            } else {
                warn!(conn_id = %id, plan = %plan, "failed to send frame to client");
            }
        }
        debug!(event = %frame.event, plan = %plan, delivered, "published to room");
        delivered
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Number of non-empty rooms.
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Members of `plan`'s room.
    pub async fn member_count(&self, plan: &MealPlanId) -> usize {
        self.inner.read().await.rooms.get(plan).map_or(0, HashSet::len)
    }

    /// Consistent snapshot of the hub's totals.
    pub async fn stats(&self) -> HubStats {
        let inner = self.inner.read().await;
        HubStats {
            connections: inner.connections.len(),
            rooms: inner.rooms.len(),
            memberships: inner.rooms.values().map(HashSet::len).sum(),
            dropped_frames: inner.connections.values().map(|c| c.drop_count()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    fn conn(id: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(8);
        (Arc::new(ClientConnection::new(id.into(), tx)), rx)
    }

    fn status_frame(plan: &str) -> Frame {
        Frame::new(
            "meal-plan-status",
            json!({"mealPlanId": plan, "status": "completed"}),
        )
    }

    #[tokio::test]
    async fn publish_reaches_only_room_members() {
        let hub = RoomHub::new();
        let (a, mut a_rx) = conn("a");
        let (b, mut b_rx) = conn("b");
        hub.add(a).await;
        hub.add(b).await;
        assert!(hub.join(&"a".into(), "p1".into()).await);
        assert!(hub.join(&"b".into(), "p2".into()).await);

        assert_eq!(hub.publish(&"p1".into(), &status_frame("p1")).await, 1);
        let text = a_rx.recv().await.unwrap();
        let frame = Frame::decode(&text).unwrap();
        assert_eq!(frame.event, "meal-plan-status");
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_unknown_connection_is_rejected() {
        let hub = RoomHub::new();
        assert!(!hub.join(&"ghost".into(), "p1".into()).await);
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn join_twice_keeps_one_membership() {
        let hub = RoomHub::new();
        let (a, _rx) = conn("a");
        hub.add(a).await;
        assert!(hub.join(&"a".into(), "p1".into()).await);
        assert!(hub.join(&"a".into(), "p1".into()).await);
        assert_eq!(hub.member_count(&"p1".into()).await, 1);
    }

    #[tokio::test]
    async fn leave_removes_membership_and_empty_room() {
        let hub = RoomHub::new();
        let (a, _rx) = conn("a");
        hub.add(a).await;
        let _ = hub.join(&"a".into(), "p1".into()).await;

        assert!(hub.leave(&"a".into(), &"p1".into()).await);
        assert!(!hub.leave(&"a".into(), &"p1".into()).await);
        assert_eq!(hub.room_count().await, 0);
        assert_eq!(hub.publish(&"p1".into(), &status_frame("p1")).await, 0);
    }

    #[tokio::test]
    async fn remove_clears_all_rooms() {
        let hub = RoomHub::new();
        let (a, _a_rx) = conn("a");
        let (b, _b_rx) = conn("b");
        hub.add(a).await;
        hub.add(b).await;
        let _ = hub.join(&"a".into(), "p1".into()).await;
        let _ = hub.join(&"a".into(), "p2".into()).await;
        let _ = hub.join(&"b".into(), "p2".into()).await;

        hub.remove(&"a".into()).await;
        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(hub.room_count().await, 1);
        assert_eq!(hub.member_count(&"p2".into()).await, 1);
    }

    #[tokio::test]
    async fn stats_sum_memberships_across_rooms() {
        let hub = RoomHub::new();
        assert_eq!(hub.stats().await, HubStats::default());

        let (a, _a_rx) = conn("a");
        let (b, _b_rx) = conn("b");
        hub.add(a).await;
        hub.add(b).await;
        let _ = hub.join(&"a".into(), "p1".into()).await;
        let _ = hub.join(&"a".into(), "p2".into()).await;
        let _ = hub.join(&"b".into(), "p2".into()).await;

        let stats = hub.stats().await;
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.rooms, 2);
        assert_eq!(stats.memberships, 3);
        assert_eq!(stats.dropped_frames, 0);
    }

    #[tokio::test]
    async fn stats_count_frames_dropped_on_full_queues() {
        let hub = RoomHub::new();
        let (tx, _rx) = mpsc::channel(1);
        hub.add(Arc::new(ClientConnection::new("a".into(), tx))).await;
        let _ = hub.join(&"a".into(), "p1".into()).await;

        assert_eq!(hub.publish(&"p1".into(), &status_frame("p1")).await, 1);
        assert_eq!(hub.publish(&"p1".into(), &status_frame("p1")).await, 0);
        assert_eq!(hub.stats().await.dropped_frames, 1);
    }

    #[tokio::test]
    async fn closed_client_is_not_counted_as_delivered() {
        let hub = RoomHub::new();
        let (a, a_rx) = conn("a");
        hub.add(a).await;
        let _ = hub.join(&"a".into(), "p1".into()).await;
        drop(a_rx);
        assert_eq!(hub.publish(&"p1".into(), &status_frame("p1")).await, 0);
    }
}
