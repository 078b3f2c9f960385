//! # mealmate-server
//!
//! Axum HTTP + WebSocket server.
//!
//! - Affiliate proxy routes under `/api/coupang/*` that validate input, call
//!   the upstream [`AffiliateClient`](mealmate_affiliate::AffiliateClient) and
//!   normalize failures into `{error, message}`
//! - Meal-plan room hub at `/ws`, fed by `POST /api/meal-plans/{id}/events`
//! - `/health`, request tracing, permissive CORS
//! - Graceful shutdown through a shared cancellation token
//!
//! ## Crate Position
//!
//! Depends on mealmate-core, mealmate-settings, mealmate-affiliate.
//! Depended on by the `mealmate` binary.

#![deny(unsafe_code)]

pub mod config;
pub mod response;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod websocket;

#[cfg(test)]
mod test_support;

pub use config::ServerConfig;
pub use server::{AppState, MealmateServer};
pub use shutdown::ShutdownCoordinator;
