//! # API Gateway
//!
//! The HTTP face of the platform:
//!
//! - **Authoring**: test CRUD behind the signed-session header and the
//!   authoring allow-list.
//! - **Public**: the published view of a test by slug.
//! - **Telemetry**: responses, funnel events, run logs; identity here is
//!   best-effort.
//! - **Admin**: password login, scoped reporting, CSV export.
//! - **Media**: multipart upload proxied to object storage.

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod media;
pub mod routes;
pub mod service;
pub mod state;

pub use config::{ConfigError, GatewayConfig, MediaConfig};
pub use error::ApiError;
pub use service::{build_router, serve};
pub use state::AppState;
