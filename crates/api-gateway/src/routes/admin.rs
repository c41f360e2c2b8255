//! Admin routes: login, scoped listing, reporting, and CSV export.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use session_auth::token::TOKEN_TTL_DAYS;
use session_auth::{mint_token, verify_password};
use shared_types::Test;
use storage::AdminFilter;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::export::responses_to_csv;
use crate::extract::AdminSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginReply {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Exchange credentials for a bearer token. The answer is identical for
/// unknown usernames and wrong passwords.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginReply>, ApiError> {
    let admin = state
        .store
        .find_admin_by_username(&body.username)?
        .filter(|admin| verify_password(&body.password, &admin.password_hash))
        .ok_or_else(|| {
            warn!(username = %body.username, "admin login rejected");
            ApiError::Unauthorized
        })?;

    let token = mint_token();
    let expires_at = Utc::now() + Duration::days(TOKEN_TTL_DAYS);
    state.store.insert_token(admin.id, &token, Some(expires_at))?;
    info!(username = %admin.username, "admin logged in");
    Ok(Json(LoginReply { token, expires_at }))
}

pub async fn admin_tests(
    session: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Test>>, ApiError> {
    let filter = AdminFilter::for_owner(session.admin.scope_owner());
    Ok(Json(state.store.list_tests(filter)?))
}

/// Full report for one test: content, funnel, and raw responses.
pub async fn report(
    session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = AdminFilter::for_owner(session.admin.scope_owner());
    let test = state.store.get_test_scoped(id, filter)?;
    let funnel = state.store.funnel(id)?;
    let responses = state.store.list_responses(id)?;
    Ok(Json(json!({
        "test": test,
        "funnel": funnel,
        "responses": responses,
    })))
}

/// CSV attachment, one row per response.
pub async fn export(
    session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let filter = AdminFilter::for_owner(session.admin.scope_owner());
    let test = state.store.get_test_scoped(id, filter)?;
    let responses = state.store.list_responses(id)?;
    let csv = responses_to_csv(&test, &responses);

    let disposition = format!("attachment; filename=\"{}.csv\"", test.slug);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
