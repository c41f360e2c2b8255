//! Media upload route.

use axum::extract::{Multipart, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::ApiError;
use crate::extract::CreatorSession;
use crate::media::{normalize_image, object_key, sniff_image, ImageKind};
use crate::state::AppState;

/// Accept one multipart `file` field, sniff it, normalize it onto the card
/// canvas, and push it to object storage. Returns the stored key and its
/// public URL.
pub async fn upload(
    _session: CreatorSession,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let media = state.media.as_ref().ok_or_else(|| {
        error!("media upload requested but object storage is not configured");
        ApiError::Internal
    })?;

    let mut data = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("multipart: {e}")))?
    {
        if field.name() == Some("file") {
            data = Some(field.bytes().await.map_err(|e| {
                ApiError::Validation(format!("multipart: {e}"))
            })?);
            break;
        }
    }
    let data = data.ok_or_else(|| ApiError::Validation("missing file field".into()))?;

    if data.is_empty() {
        return Err(ApiError::Validation("empty upload".into()));
    }
    if data.len() > state.config.media.max_upload_bytes {
        return Err(ApiError::Validation("file too large".into()));
    }
    let kind = sniff_image(&data)
        .ok_or_else(|| ApiError::Validation("unsupported image format".into()))?;

    // Uploads are stored normalized, never verbatim.
    let normalized = normalize_image(&data)?;
    let key = object_key(&normalized, ImageKind::Jpeg, Utc::now().timestamp_millis());
    media.put(&key, normalized.into()).await?;
    let url = media.url_for(&key);
    info!(key, source = kind.content_type(), "media uploaded");
    Ok(Json(json!({ "key": key, "url": url })))
}
