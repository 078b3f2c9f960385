//! # mealmate-core
//!
//! Foundation types shared by every Mealmate crate.
//!
//! - **Branded IDs**: [`ids::MealPlanId`], [`ids::ConnectionId`] as newtypes
//! - **Real-time vocabulary**: [`events::RealtimeEvent`] names, meal-plan payloads,
//!   and the [`events::Frame`] wire format
//! - **Failure normalization**: [`errors::Failure`] turns any caught failure into
//!   a `{kind, message}` pair before it is rendered
//! - **Logging**: [`logging::init_subscriber`] and the in-memory capture used by tests
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other mealmate crates.

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
