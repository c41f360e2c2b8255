//! `quizdeck-bot` binary: the long-poll loop.

use bot_frontend::api_client::GatewayClient;
use bot_frontend::transport::{ChatTransport, TelegramTransport};
use bot_frontend::{BotConfig, Dispatcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = BotConfig::from_env()?;
    config.validate()?;

    let transport = Arc::new(TelegramTransport::new(
        &config.chat_api_base,
        &config.bot_token,
    ));
    let api = Arc::new(GatewayClient::new(&config.gateway_base));
    let poll_timeout = config.poll_timeout_secs;
    let dispatcher = Dispatcher::new(transport.clone(), api, config);

    info!("bot started");
    let mut offset = 0i64;
    loop {
        let updates = match transport.get_updates(offset, poll_timeout).await {
            Ok(updates) => updates,
            Err(e) => {
                error!(error = %e, "poll failed, backing off");
                tokio::time::sleep(Duration::from_secs(3)).await;
                continue;
            }
        };
        for update in updates {
            offset = offset.max(update.update_id + 1);
            if let Err(e) = dispatcher.handle_update(update).await {
                warn!(error = %e, "update handling failed");
            }
        }
    }
}
