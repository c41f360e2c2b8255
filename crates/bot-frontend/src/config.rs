//! Bot configuration, sourced from the environment.

use crate::error::BotError;

#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Chat platform bot token.
    pub bot_token: String,
    /// Base URL of the chat platform API.
    pub chat_api_base: String,
    /// Base URL of the gateway, without the `/api/v1` suffix.
    pub gateway_base: String,
    /// Web-app URL sent to admins by `/admin`.
    pub webapp_url: Option<String>,
    /// Numeric user ids allowed to use `/admin` and `/publish`.
    pub admin_ids: Vec<i64>,
    /// Long-poll timeout in seconds.
    pub poll_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_api_base: "https://api.telegram.org".into(),
            gateway_base: "http://127.0.0.1:8080".into(),
            webapp_url: None,
            admin_ids: Vec::new(),
            poll_timeout_secs: 30,
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, BotError> {
        let mut config = Self::default();
        config.bot_token = env_var("QUIZDECK_BOT_TOKEN").unwrap_or_default();
        if let Some(base) = env_var("QUIZDECK_CHAT_API_BASE") {
            config.chat_api_base = base;
        }
        if let Some(base) = env_var("QUIZDECK_GATEWAY_BASE") {
            config.gateway_base = base;
        }
        config.webapp_url = env_var("QUIZDECK_WEBAPP_URL");
        if let Some(ids) = env_var("QUIZDECK_ADMIN_IDS") {
            config.admin_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse()
                        .map_err(|_| BotError::Config("QUIZDECK_ADMIN_IDS".into()))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(timeout) = env_var("QUIZDECK_POLL_TIMEOUT_SECS") {
            config.poll_timeout_secs = timeout
                .parse()
                .map_err(|_| BotError::Config("QUIZDECK_POLL_TIMEOUT_SECS".into()))?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BotError> {
        if self.bot_token.is_empty() {
            return Err(BotError::Config("QUIZDECK_BOT_TOKEN must be set".into()));
        }
        if self.poll_timeout_secs == 0 {
            return Err(BotError::Config(
                "QUIZDECK_POLL_TIMEOUT_SECS must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
