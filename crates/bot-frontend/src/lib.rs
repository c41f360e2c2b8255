//! # Bot Frontend
//!
//! The chat-bot process. Ports-and-adapters: [`transport::ChatTransport`]
//! is the outbound port to the chat platform, [`api_client::ApiPort`] the
//! port to the gateway; [`dispatch::Dispatcher`] holds the whole
//! conversation logic against those two ports.

pub mod api_client;
pub mod config;
pub mod deep_link;
pub mod dispatch;
pub mod error;
pub mod publish;
pub mod session;
pub mod transport;

pub use config::BotConfig;
pub use dispatch::Dispatcher;
pub use error::BotError;
