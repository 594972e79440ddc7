//! Activity relay service binary.
//!
//! ```text
//! BOT_ENDPOINT=http://localhost:3978/api/messages cargo run
//! ```

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use activity_relay::{
    AppState, RelayConfig,
    bot::ReqwestBotTransport,
    conversation::{MemoryConversationDirectory, SharedConversationDirectory},
    router,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = RelayConfig::from_env()?;
    let transport = Arc::new(ReqwestBotTransport::new(reqwest::Client::new()));
    let directory: SharedConversationDirectory =
        Arc::new(MemoryConversationDirectory::new(transport));
    let state = AppState::new(config.clone(), directory);

    let addr: std::net::SocketAddr = config.bind().parse()?;
    tracing::info!("activity-relay listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
