//! Gateway configuration with validation.
//!
//! Everything is sourced from the environment (a `.env` file is honored by
//! the binary). `validate()` runs once at startup.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "quizdeck.db";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Main gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address.
    pub host: IpAddr,
    pub port: u16,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Issuer secret the signed-session verifier is keyed with.
    pub bot_secret: String,
    /// Numeric user ids allowed to author tests.
    pub admin_ids: Vec<i64>,
    /// When set and no admin account exists, a default `admin` account is
    /// created with this password at startup.
    pub bootstrap_admin_password: Option<String>,
    pub media: MediaConfig,
}

/// Object-storage settings for the media upload proxy. All-or-nothing: when
/// no endpoint is configured the upload route answers 500.
#[derive(Debug, Clone, Default)]
pub struct MediaConfig {
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Public URL base the returned media URLs are built from; falls back
    /// to `endpoint/bucket/key`.
    pub public_base_url: Option<String>,
    pub max_upload_bytes: usize,
}

impl MediaConfig {
    /// Whether uploads are configured at all.
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            bot_secret: String::new(),
            admin_ids: Vec::new(),
            bootstrap_admin_password: None,
            media: MediaConfig {
                region: "us-east-1".into(),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                ..MediaConfig::default()
            },
        }
    }
}

impl GatewayConfig {
    /// Build from `QUIZDECK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = env_var("QUIZDECK_HOST") {
            config.host = host
                .parse()
                .map_err(|_| ConfigError::Invalid("QUIZDECK_HOST"))?;
        }
        if let Some(port) = env_var("QUIZDECK_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid("QUIZDECK_PORT"))?;
        }
        if let Some(path) = env_var("QUIZDECK_DB") {
            config.database_path = PathBuf::from(path);
        }
        config.bot_secret = env_var("QUIZDECK_BOT_SECRET").unwrap_or_default();
        if let Some(ids) = env_var("QUIZDECK_ADMIN_IDS") {
            config.admin_ids = parse_id_list(&ids).ok_or(ConfigError::Invalid("QUIZDECK_ADMIN_IDS"))?;
        }
        config.bootstrap_admin_password = env_var("QUIZDECK_BOOTSTRAP_ADMIN_PASSWORD");

        config.media.endpoint = env_var("QUIZDECK_S3_ENDPOINT");
        config.media.bucket = env_var("QUIZDECK_S3_BUCKET");
        if let Some(region) = env_var("QUIZDECK_S3_REGION") {
            config.media.region = region;
        }
        config.media.access_key_id = env_var("QUIZDECK_S3_ACCESS_KEY");
        config.media.secret_access_key = env_var("QUIZDECK_S3_SECRET_KEY");
        config.media.public_base_url = env_var("QUIZDECK_MEDIA_BASE_URL");
        if let Some(max) = env_var("QUIZDECK_MAX_UPLOAD_BYTES") {
            config.media.max_upload_bytes = max
                .parse()
                .map_err(|_| ConfigError::Invalid("QUIZDECK_MAX_UPLOAD_BYTES"))?;
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_secret.is_empty() {
            return Err(ConfigError::MissingBotSecret);
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("QUIZDECK_PORT"));
        }
        if self.media.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("QUIZDECK_MAX_UPLOAD_BYTES"));
        }
        if self.media.is_configured() {
            let complete = self.media.bucket.is_some()
                && self.media.access_key_id.is_some()
                && self.media.secret_access_key.is_some();
            if !complete {
                return Err(ConfigError::IncompleteMedia);
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.host, self.port)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_id_list(raw: &str) -> Option<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("QUIZDECK_BOT_SECRET must be set")]
    MissingBotSecret,

    #[error("invalid value for {0}")]
    Invalid(&'static str),

    #[error("media storage needs endpoint, bucket, and credentials together")]
    IncompleteMedia,
}
