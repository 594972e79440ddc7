use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::debug;

use crate::activity::Activity;

/// Outcome of a single bot call as seen at the transport boundary.
#[derive(Debug, Clone)]
pub struct BotResponse {
    /// Status code reported by the bot, if it reported one at all.
    pub status: Option<u16>,
    pub body: BotReplyBody,
}

/// Shape of the bot's response body, resolved once by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotReplyBody {
    /// Raw textual body, relayed verbatim in error responses.
    Text(String),
    /// Message/status pair from transports that expose structured fields
    /// instead of a readable body.
    Fields {
        message: Option<String>,
        status: Option<u16>,
    },
    /// No usable body.
    Empty,
}

#[derive(Debug, Error)]
pub enum BotCallError {
    #[error("bot transport error")]
    Transport(#[from] reqwest::Error),
    #[error("bot endpoint configuration error")]
    Config(#[source] anyhow::Error),
}

/// Synchronous request/response leg towards the bot endpoint.
#[async_trait]
pub trait BotTransport: Send + Sync {
    /// Posts one activity to the bot endpoint and waits for its reply.
    ///
    /// Bot-side rejections are part of the [`BotResponse`]; `Err` is
    /// reserved for transport faults.
    async fn post_activity(
        &self,
        endpoint: &str,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<BotResponse, BotCallError>;
}

pub type SharedBotTransport = Arc<dyn BotTransport>;

pub struct ReqwestBotTransport {
    client: Client,
}

impl ReqwestBotTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BotTransport for ReqwestBotTransport {
    async fn post_activity(
        &self,
        endpoint: &str,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<BotResponse, BotCallError> {
        let url = Url::parse(endpoint).map_err(|err| BotCallError::Config(err.into()))?;

        let started = Instant::now();
        // No relay-side timeout: the await inherits whatever the client
        // enforces. A client with no timeout waits as long as the bot does.
        let response = self
            .client
            .post(url)
            .json(activity)
            .send()
            .await
            .map_err(|err| {
                counter!("relay_errors_total", "kind" => "bot_transport").increment(1);
                BotCallError::Transport(err)
            })?;

        let status = response.status();
        histogram!(
            "relay_bot_roundtrip_seconds",
            "status" => status.as_str().to_string()
        )
        .record(started.elapsed().as_secs_f64());
        debug!(conversation_id, %status, "bot replied");

        let body = if status.is_success() {
            BotReplyBody::Empty
        } else {
            match response.text().await {
                Ok(text) => BotReplyBody::Text(text),
                Err(_) => BotReplyBody::Empty,
            }
        };

        Ok(BotResponse {
            status: Some(status.as_u16()),
            body,
        })
    }
}
