//! # Storage
//!
//! Relational persistence for the platform: tests with their nested
//! questions/answers/results, completed-run responses, funnel events,
//! coarse run logs, and admin accounts.
//!
//! ## Design
//!
//! - One [`Store`] per process, holding a SQLite connection behind a mutex;
//!   every mutating operation runs in its own transaction.
//! - Slug uniqueness is a database constraint plus the advisory
//!   [`slug::unique_slug`] pre-check-and-retry loop, modeled as a bounded
//!   pure function over an injected "is this slug taken" capability.
//! - Logs and responses survive test deletion: their `test_id` foreign keys
//!   are nullable and detach via `ON DELETE SET NULL`.

pub mod error;
pub mod schema;
pub mod slug;
pub mod store;
pub mod types;

pub use error::StorageError;
pub use slug::{slugify, unique_slug, UniqueSlugError};
pub use store::Store;
pub use types::*;
