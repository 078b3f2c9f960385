//! HTTP route handlers.

pub mod affiliate;
pub mod meal_plans;
