//! Media upload pipeline: magic-byte sniffing, card-image normalization,
//! and object-storage writes.
//!
//! Accepted uploads are decoded, scaled and center-cropped onto the card
//! canvas, then re-encoded as JPEG before storage. Source metadata does not
//! survive the re-encode.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::error;

use crate::config::MediaConfig;
use crate::error::ApiError;

/// Image kinds accepted by the upload route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl ImageKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// Identify an image by its magic bytes.
pub fn sniff_image(data: &[u8]) -> Option<ImageKind> {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(ImageKind::Png)
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageKind::Jpeg)
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some(ImageKind::Webp)
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some(ImageKind::Gif)
    } else {
        None
    }
}

/// Card canvas every stored image is normalized onto.
const CARD_WIDTH: u32 = 610;
const CARD_HEIGHT: u32 = 1000;
const JPEG_QUALITY: u8 = 82;

/// Decode an upload, scale it onto the card canvas with a center crop, and
/// re-encode it as JPEG. Alpha is flattened onto white.
pub fn normalize_image(data: &[u8]) -> Result<Vec<u8>, ApiError> {
    let decoded = image::load_from_memory(data)
        .map_err(|e| ApiError::Validation(format!("unreadable image: {e}")))?;
    let card = DynamicImage::ImageRgb8(flatten_onto_white(decoded)).resize_to_fill(
        CARD_WIDTH,
        CARD_HEIGHT,
        FilterType::Lanczos3,
    );
    let mut out = Vec::new();
    card.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))
        .map_err(|e| {
            error!(error = %e, "image re-encode failed");
            ApiError::Internal
        })?;
    Ok(out)
}

/// JPEG has no alpha channel; composite transparent pixels over white.
fn flatten_onto_white(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in rgb.pixels_mut().zip(rgba.pixels()) {
        let alpha = src[3] as u32;
        for channel in 0..3 {
            dst[channel] = ((src[channel] as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        }
    }
    rgb
}

/// Content-addressed object key: `uploads/<sha256 prefix>_<unix ms>.<ext>`.
pub fn object_key(data: &[u8], kind: ImageKind, now_ms: i64) -> String {
    let digest = hex::encode(Sha256::digest(data));
    format!("uploads/{}_{}.{}", &digest[..16], now_ms, kind.extension())
}

/// Handle to the configured object-storage bucket.
pub struct MediaStore {
    store: Arc<dyn ObjectStore>,
    endpoint: String,
    bucket: String,
    public_base_url: Option<String>,
}

impl MediaStore {
    /// Build from config; `None` when media storage is not configured.
    pub fn from_config(config: &MediaConfig) -> Result<Option<Self>, ApiError> {
        if !config.is_configured() {
            return Ok(None);
        }
        let (endpoint, bucket) = match (&config.endpoint, &config.bucket) {
            (Some(endpoint), Some(bucket)) => (endpoint.clone(), bucket.clone()),
            _ => return Err(ApiError::Internal),
        };
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(endpoint.clone())
            .with_bucket_name(bucket.clone())
            .with_region(config.region.clone())
            .with_allow_http(true);
        if let Some(key) = &config.access_key_id {
            builder = builder.with_access_key_id(key.clone());
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret.clone());
        }
        let store = builder.build().map_err(|e| {
            error!(error = %e, "object store configuration failed");
            ApiError::Internal
        })?;
        Ok(Some(Self {
            store: Arc::new(store),
            endpoint,
            bucket,
            public_base_url: config.public_base_url.clone(),
        }))
    }

    /// Upload `data` under `key`. Upstream detail is logged, never returned.
    pub async fn put(&self, key: &str, data: Bytes) -> Result<(), ApiError> {
        self.store
            .put(&ObjectPath::from(key), PutPayload::from(data))
            .await
            .map_err(|e| {
                error!(error = %e, key, "media upload failed");
                ApiError::Internal
            })?;
        Ok(())
    }

    /// Public URL for an uploaded key.
    pub fn url_for(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!(
                "{}/{}/{}",
                self.endpoint.trim_end_matches('/'),
                self.bucket,
                key
            ),
        }
    }
}
