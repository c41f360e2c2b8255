//! Gateway client: the outbound port and its HTTP adapter.

use async_trait::async_trait;
use serde_json::json;
use shared_types::{RunEventType, Test};
use tracing::warn;

use crate::error::BotError;

/// Outbound port to the gateway.
#[async_trait]
pub trait ApiPort: Send + Sync {
    /// Fetch the published view of a test.
    async fn get_public_test(&self, slug: &str) -> Result<Test, BotError>;

    /// Record an open/complete run log. Best-effort: failures are logged by
    /// the caller side, never fatal to a chat interaction.
    async fn record_run(
        &self,
        slug: &str,
        user_id: i64,
        event_type: RunEventType,
        source_chat_id: Option<i64>,
    ) -> Result<(), BotError>;
}

/// HTTP adapter against the gateway's `/api/v1` surface.
pub struct GatewayClient {
    http: reqwest::Client,
    base: String,
}

impl GatewayClient {
    pub fn new(gateway_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("{}/api/v1", gateway_base.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ApiPort for GatewayClient {
    async fn get_public_test(&self, slug: &str) -> Result<Test, BotError> {
        let response = self
            .http
            .get(format!("{}/tests/slug/{slug}/public", self.base))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Gateway {
                status: status.as_u16(),
                message: "test unavailable".into(),
            });
        }
        Ok(response.json().await?)
    }

    async fn record_run(
        &self,
        slug: &str,
        user_id: i64,
        event_type: RunEventType,
        source_chat_id: Option<i64>,
    ) -> Result<(), BotError> {
        let response = self
            .http
            .post(format!("{}/tests/slug/{slug}/runs", self.base))
            .json(&json!({
                "event_type": event_type,
                "source_chat_id": source_chat_id,
                "user_id": user_id,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(slug, status = response.status().as_u16(), "run log rejected");
        }
        Ok(())
    }
}
