//! Telemetry routes: responses, funnel events, and run logs.
//!
//! Identity is best-effort here: an unverifiable header degrades to the
//! anonymous user instead of rejecting the write.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use shared_types::{EventType, RunEventType, TestEvent, TestResponse};
use storage::{LeadPatch, NewResponse};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::MaybeSession;
use crate::state::AppState;

pub async fn create_response(
    identity: MaybeSession,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(mut input): Json<NewResponse>,
) -> Result<(StatusCode, Json<TestResponse>), ApiError> {
    // A verified session overrides whatever identity the payload claims.
    if let Some(session) = &identity.0 {
        input.user_id = session.user.id;
        input.user_username = session.user.username.clone();
    }
    let response = state.store.create_response(&slug, input)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn patch_lead(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<LeadPatch>,
) -> Result<Json<TestResponse>, ApiError> {
    Ok(Json(state.store.update_response_lead(id, patch)?))
}

#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub event_type: EventType,
    #[serde(default)]
    pub question_index: Option<i64>,
}

pub async fn record_event(
    identity: MaybeSession,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<EventBody>,
) -> Result<(StatusCode, Json<TestEvent>), ApiError> {
    let event = state.store.record_event(
        &slug,
        identity.user_id(),
        body.event_type,
        body.question_index,
    )?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
pub struct RunBody {
    pub event_type: RunEventType,
    #[serde(default)]
    pub source_chat_id: Option<i64>,
}

/// Coarse open/complete logging. `open` writes are fire-and-forget: a
/// persistence failure is logged and the request still succeeds, so a
/// flaky disk never blocks a test from starting.
pub async fn record_run(
    identity: MaybeSession,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<RunBody>,
) -> Result<StatusCode, ApiError> {
    let outcome = state.store.record_run(
        &slug,
        identity.user_id(),
        body.event_type,
        body.source_chat_id,
    );
    match (body.event_type, outcome) {
        (_, Ok(_)) => Ok(StatusCode::ACCEPTED),
        (RunEventType::Open, Err(e)) => {
            warn!(error = %e, slug, "open run log dropped");
            Ok(StatusCode::ACCEPTED)
        }
        (RunEventType::Complete, Err(e)) => Err(e.into()),
    }
}
