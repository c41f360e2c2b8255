//! `quizdeck-api` binary.

use api_gateway::media::MediaStore;
use api_gateway::{serve, AppState, GatewayConfig};
use session_auth::hash_password;
use shared_types::AdminScope;
use storage::Store;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = GatewayConfig::from_env()?;
    config.validate()?;

    let store = Store::open(&config.database_path)?;
    bootstrap_admin(&store, &config)?;

    let media = MediaStore::from_config(&config.media)
        .map_err(|_| anyhow::anyhow!("object store configuration failed"))?;
    if media.is_none() {
        info!("media storage not configured; uploads disabled");
    }

    serve(AppState::new(store, config, media)).await
}

/// Seed the built-in `admin` account on first start.
fn bootstrap_admin(store: &Store, config: &GatewayConfig) -> anyhow::Result<()> {
    let Some(password) = &config.bootstrap_admin_password else {
        return Ok(());
    };
    if store.count_admins()? > 0 {
        return Ok(());
    }
    store.create_admin("admin", &hash_password(password), AdminScope::All, None)?;
    info!("bootstrap admin account created");
    Ok(())
}
