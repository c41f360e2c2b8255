//! Request extractors for the three auth classes.
//!
//! - [`CreatorSession`]: signed session plus authoring allow-list.
//! - [`MaybeSession`]: best-effort identity for telemetry routes.
//! - [`AdminSession`]: bearer token resolved to an admin account.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use session_auth::{is_platform_admin, verify_init_data, SignedSession};
use shared_types::AdminUser;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

pub const INIT_DATA_HEADER: &str = "x-init-data";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn verify_header(parts: &Parts, state: &AppState) -> Result<SignedSession, ApiError> {
    let raw = header(parts, INIT_DATA_HEADER).ok_or(ApiError::Unauthorized)?;
    let session = verify_init_data(raw, &state.config.bot_secret, Utc::now().timestamp())?;
    Ok(session)
}

/// A verified session whose user is on the authoring allow-list.
pub struct CreatorSession(pub SignedSession);

#[async_trait]
impl FromRequestParts<AppState> for CreatorSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = verify_header(parts, state)?;
        if !is_platform_admin(session.user.id, &state.config.admin_ids) {
            debug!(user_id = session.user.id, "user not on authoring allow-list");
            return Err(ApiError::Forbidden);
        }
        Ok(Self(session))
    }
}

/// Best-effort identity: an invalid or absent header yields `None` instead
/// of rejecting the request.
pub struct MaybeSession(pub Option<SignedSession>);

impl MaybeSession {
    pub fn user_id(&self) -> i64 {
        self.0.as_ref().map(|s| s.user.id).unwrap_or(0)
    }

    pub fn username(&self) -> Option<String> {
        self.0.as_ref().and_then(|s| s.user.username.clone())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = match verify_header(parts, state) {
            Ok(session) => Some(session),
            Err(_) => None,
        };
        Ok(Self(session))
    }
}

/// A bearer token resolved to its admin account.
pub struct AdminSession {
    pub admin: AdminUser,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = header(parts, ADMIN_TOKEN_HEADER).ok_or(ApiError::Unauthorized)?;
        let resolved = state.store.find_valid_token(token, Utc::now())?;
        match resolved {
            Some((_, admin)) => Ok(Self { admin }),
            None => Err(ApiError::Unauthorized),
        }
    }
}
