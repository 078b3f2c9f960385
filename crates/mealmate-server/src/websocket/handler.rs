//! `/ws` upgrade and per-socket session loop.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use mealmate_core::events::{Frame, RealtimeEvent, RoomRequest};
use mealmate_core::ids::{ConnectionId, MealPlanId};
use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ClientConnection, SEND_QUEUE};
use super::hub::RoomHub;
use crate::server::AppState;

/// What an inbound text frame did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Connection joined the plan's room.
    Joined(MealPlanId),
    /// Connection left the plan's room (or was not in it).
    Left(MealPlanId),
    /// Well-formed frame for an event the hub does not act on.
    Ignored(String),
    /// Not a frame, or a room request without a plan id.
    Invalid,
}

/// GET /ws
///
/// A connection slot is reserved before the upgrade and held by the socket
/// task, so concurrent upgrades can never exceed the cap.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let Ok(slot) = Arc::clone(&state.connection_slots).try_acquire_owned() else {
        warn!(max = state.max_connections, "rejecting websocket: connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };
    let hub = Arc::clone(&state.hub);
    let shutdown = state.shutdown.token();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| run_socket(socket, ConnectionId::new(), hub, shutdown, slot))
}

/// Drive one socket until the peer closes, the write side fails, or the
/// server shuts down. The connection is removed from every room on exit,
/// and `slot` is released after that.
#[instrument(skip_all, fields(conn_id = %id))]
pub async fn run_socket(
    socket: WebSocket,
    id: ConnectionId,
    hub: Arc<RoomHub>,
    shutdown: CancellationToken,
    slot: OwnedSemaphorePermit,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<String>>(SEND_QUEUE);
    let connection = Arc::new(ClientConnection::new(id.clone(), tx));
    hub.add(Arc::clone(&connection)).await;
    info!("client connected");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            outbound = rx.recv() => {
                let Some(text) = outbound else { break };
                if ws_tx.send(Message::Text(String::clone(&text).into())).await.is_err() {
                    break;
                }
            }
            inbound = ws_rx.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let _ = handle_text(text.as_str(), &id, &hub).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    if let Ok(text) = std::str::from_utf8(&data) {
                        let _ = handle_text(text, &id, &hub).await;
                    } else {
                        debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "socket read failed");
                    break;
                }
            }
        }
    }

    hub.remove(&id).await;
    info!(
        age_ms = u64::try_from(connection.age().as_millis()).unwrap_or(u64::MAX),
        dropped = connection.drop_count(),
        "client disconnected"
    );
    drop(slot);
}

/// Apply one inbound text frame to the hub.
pub async fn handle_text(text: &str, id: &ConnectionId, hub: &RoomHub) -> HandleOutcome {
    let frame = match Frame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "invalid frame received");
            return HandleOutcome::Invalid;
        }
    };

    let event = match frame.known_event() {
        Some(event @ (RealtimeEvent::JoinMealPlan | RealtimeEvent::LeaveMealPlan)) => event,
        _ => {
            debug!(event = %frame.event, "ignoring client event");
            return HandleOutcome::Ignored(frame.event);
        }
    };

    let request: RoomRequest = match serde_json::from_value(frame.data) {
        Ok(request) => request,
        Err(e) => {
            warn!(event = %event, error = %e, "room request without mealPlanId");
            return HandleOutcome::Invalid;
        }
    };
    let plan = request.meal_plan_id;

    if event == RealtimeEvent::JoinMealPlan {
        if hub.join(id, plan.clone()).await {
            HandleOutcome::Joined(plan)
        } else {
            HandleOutcome::Invalid
        }
    } else {
        let _ = hub.leave(id, &plan).await;
        HandleOutcome::Left(plan)
    }
}
