//! Route handlers, grouped by concern.

pub mod admin;
pub mod health;
pub mod media;
pub mod stats;
pub mod telemetry;
