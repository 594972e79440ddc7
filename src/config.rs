use anyhow::{Context, Result};

const DEFAULT_BIND: &str = "0.0.0.0:8092";

/// Runtime configuration for the relay service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelayConfig {
    bot_endpoint: String,
    bind: String,
}

impl RelayConfig {
    pub fn new(bot_endpoint: impl Into<String>) -> Self {
        Self {
            bot_endpoint: bot_endpoint.into(),
            bind: DEFAULT_BIND.to_string(),
        }
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Reads `BOT_ENDPOINT` (required) and `BIND` (optional) from the
    /// environment.
    pub fn from_env() -> Result<Self> {
        let bot_endpoint =
            std::env::var("BOT_ENDPOINT").context("BOT_ENDPOINT must point at the bot's messaging endpoint")?;
        let bind = std::env::var("BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
        Ok(Self { bot_endpoint, bind })
    }

    pub fn bot_endpoint(&self) -> &str {
        &self.bot_endpoint
    }

    pub fn bind(&self) -> &str {
        &self.bind
    }
}
