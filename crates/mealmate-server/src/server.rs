//! `MealmateServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use mealmate_affiliate::AffiliateClient;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::routes::{affiliate, meal_plans};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::handler::ws_handler;
use crate::websocket::hub::{HubStats, RoomHub};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Upstream affiliate API.
    pub affiliate: Arc<dyn AffiliateClient>,
    /// Meal-plan rooms.
    pub hub: Arc<RoomHub>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// WebSocket connection cap.
    pub max_connections: usize,
    /// One permit per open `/ws` socket; `max_connections` in total.
    pub connection_slots: Arc<Semaphore>,
    /// Largest accepted WebSocket message.
    pub max_message_size: usize,
}

/// The main Mealmate server.
pub struct MealmateServer {
    config: ServerConfig,
    affiliate: Arc<dyn AffiliateClient>,
    hub: Arc<RoomHub>,
    shutdown: Arc<ShutdownCoordinator>,
    connection_slots: Arc<Semaphore>,
    start_time: Instant,
}

impl MealmateServer {
    /// Create a new server around an upstream client.
    pub fn new(config: ServerConfig, affiliate: Arc<dyn AffiliateClient>) -> Self {
        let slots = config.max_connections.min(Semaphore::MAX_PERMITS);
        Self {
            config,
            affiliate,
            hub: Arc::new(RoomHub::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            connection_slots: Arc::new(Semaphore::new(slots)),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            affiliate: Arc::clone(&self.affiliate),
            hub: Arc::clone(&self.hub),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            max_connections: self.config.max_connections,
            connection_slots: Arc::clone(&self.connection_slots),
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .route("/api/coupang/categories", get(affiliate::category_by_query))
            .route(
                "/api/coupang/categories/{categoryId}",
                get(affiliate::category_by_path),
            )
            .route("/api/coupang/search", get(affiliate::search))
            .route("/api/coupang/deeplink", post(affiliate::deeplink))
            .route(
                "/api/meal-plans/{mealPlanId}/events",
                post(meal_plans::publish),
            )
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();
        info!(%addr, "mealmate server listening");

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server terminated with error");
            }
            info!("mealmate server stopped");
        });
        Ok((addr, handle))
    }

    /// Get the room hub.
    pub fn hub(&self) -> &Arc<RoomHub> {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// `/health` body: liveness plus the hub's room totals.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Always `"ok"` while serving.
    pub status: &'static str,
    /// Whole seconds since the server was created.
    pub uptime_secs: u64,
    /// Connection and room totals.
    #[serde(flatten)]
    pub hub: HubStats,
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        hub: state.hub.stats().await,
    })
}
