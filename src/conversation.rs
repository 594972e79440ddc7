use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    activity::{Activity, ConversationAccount},
    bot::{BotCallError, BotReplyBody, SharedBotTransport},
};

pub const MAX_ACTIVITY_HISTORY: usize = 1024;

/// Outcome of forwarding one activity to the bot, stamped with the
/// identifier assigned to the activity.
#[derive(Debug, Clone)]
pub struct BotReply {
    pub activity_id: String,
    pub status: Option<u16>,
    pub body: BotReplyBody,
}

/// A resolved conversation. The relay borrows a handle per request and
/// only ever forwards through it.
#[async_trait]
pub trait ConversationHandle: Send + Sync {
    fn conversation_id(&self) -> &str;

    /// Forwards the activity to the bot endpoint, optionally recording it
    /// in the conversation's local history first, and waits for the bot's
    /// synchronous response.
    async fn post_activity_to_bot(
        &self,
        activity: &Activity,
        record_activity: bool,
    ) -> Result<BotReply, BotCallError>;
}

pub type SharedConversationHandle = Arc<dyn ConversationHandle>;

/// Conversation resolution collaborator.
#[async_trait]
pub trait ConversationDirectory: Send + Sync {
    /// Creates a conversation bound to a bot endpoint, returning its id.
    async fn create(&self, bot_endpoint: &str) -> anyhow::Result<String>;

    /// Yields the handle for an existing conversation, or `None`.
    async fn resolve(&self, conversation_id: &str) -> Option<SharedConversationHandle>;
}

pub type SharedConversationDirectory = Arc<dyn ConversationDirectory>;

struct ConversationRecord {
    bot_endpoint: String,
    history: Vec<Activity>,
    created_at: OffsetDateTime,
    last_activity_at: Option<OffsetDateTime>,
}

impl ConversationRecord {
    fn new(bot_endpoint: String) -> Self {
        Self {
            bot_endpoint,
            history: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
            last_activity_at: None,
        }
    }
}

/// In-memory directory binding each conversation to a bot endpoint and a
/// bounded local activity record.
pub struct MemoryConversationDirectory {
    transport: SharedBotTransport,
    inner: Arc<RwLock<HashMap<String, ConversationRecord>>>,
}

impl MemoryConversationDirectory {
    pub fn new(transport: SharedBotTransport) -> Self {
        Self {
            transport,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn history_len(&self, conversation_id: &str) -> usize {
        let guard = self.inner.read().await;
        guard
            .get(conversation_id)
            .map(|record| record.history.len())
            .unwrap_or(0)
    }

    pub async fn created_at(&self, conversation_id: &str) -> Option<OffsetDateTime> {
        let guard = self.inner.read().await;
        guard.get(conversation_id).map(|record| record.created_at)
    }

    pub async fn last_activity_at(&self, conversation_id: &str) -> Option<OffsetDateTime> {
        let guard = self.inner.read().await;
        guard
            .get(conversation_id)
            .and_then(|record| record.last_activity_at)
    }
}

#[async_trait]
impl ConversationDirectory for MemoryConversationDirectory {
    async fn create(&self, bot_endpoint: &str) -> anyhow::Result<String> {
        let conversation_id = Uuid::new_v4().to_string();
        let mut guard = self.inner.write().await;
        guard.insert(
            conversation_id.clone(),
            ConversationRecord::new(bot_endpoint.to_string()),
        );
        Ok(conversation_id)
    }

    async fn resolve(&self, conversation_id: &str) -> Option<SharedConversationHandle> {
        let guard = self.inner.read().await;
        let record = guard.get(conversation_id)?;
        Some(Arc::new(DirectoryHandle {
            conversation_id: conversation_id.to_string(),
            bot_endpoint: record.bot_endpoint.clone(),
            transport: Arc::clone(&self.transport),
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct DirectoryHandle {
    conversation_id: String,
    bot_endpoint: String,
    transport: SharedBotTransport,
    inner: Arc<RwLock<HashMap<String, ConversationRecord>>>,
}

#[async_trait]
impl ConversationHandle for DirectoryHandle {
    fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    async fn post_activity_to_bot(
        &self,
        activity: &Activity,
        record_activity: bool,
    ) -> Result<BotReply, BotCallError> {
        let activity_id = Uuid::new_v4().to_string();
        let mut stamped = activity.clone();
        stamped.id = Some(activity_id.clone());
        if stamped.conversation.is_none() {
            stamped.conversation = Some(ConversationAccount {
                id: self.conversation_id.clone(),
            });
        }

        if record_activity {
            let mut guard = self.inner.write().await;
            if let Some(record) = guard.get_mut(&self.conversation_id) {
                // Bounded record: the oldest entry gives way.
                if record.history.len() >= MAX_ACTIVITY_HISTORY {
                    record.history.remove(0);
                }
                record.history.push(stamped.clone());
                record.last_activity_at = Some(OffsetDateTime::now_utc());
            }
        }

        let response = self
            .transport
            .post_activity(&self.bot_endpoint, &self.conversation_id, &stamped)
            .await?;

        Ok(BotReply {
            activity_id,
            status: response.status,
            body: response.body,
        })
    }
}
