//! Real-time room hub: `/ws` connections grouped by meal plan.

pub mod connection;
pub mod handler;
pub mod hub;
