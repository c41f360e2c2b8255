//! # Shared Types Crate
//!
//! Domain entities for the QuizDeck platform, shared across the storage
//! layer, the API gateway, and the bot front-end.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate types are defined here.
//! - **Wire-Stable**: Serde representations match the public API JSON, so
//!   the gateway and the bot deserialize the same shapes.

pub mod entities;

pub use entities::*;
