use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use metrics::counter;
use serde_json::json;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use crate::activity::Activity;

/// Reserved UI control command that must never be rebroadcast.
pub const INSPECT_OPEN_COMMAND: &str = "/INSPECT open";

/// Handle over a live subscriber socket. Sends are non-blocking and
/// fire-and-forget.
#[derive(Clone)]
pub struct EchoSocket {
    tx: mpsc::UnboundedSender<String>,
}

impl EchoSocket {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues a payload for delivery. Returns false when the peer is gone.
    pub fn send(&self, payload: String) -> bool {
        self.tx.send(payload).is_ok()
    }

    pub fn same_channel(&self, other: &EchoSocket) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

/// Lookup-only view of the live subscriber sockets. Registration and
/// removal are owned by the stream transport, not by the relay.
#[async_trait]
pub trait SubscriberRegistry: Send + Sync {
    async fn socket_for(&self, conversation_id: &str) -> Option<EchoSocket>;
}

pub type SharedSubscriberRegistry = Arc<dyn SubscriberRegistry>;

#[derive(Default)]
pub struct MemorySubscriberRegistry {
    inner: RwLock<HashMap<String, EchoSocket>>,
}

impl MemorySubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the socket for a conversation, replacing any previous
    /// subscriber. The replaced sender is dropped, which closes its
    /// forward loop.
    pub async fn register(&self, conversation_id: impl Into<String>, socket: EchoSocket) {
        self.inner.write().await.insert(conversation_id.into(), socket);
    }

    /// Removes the entry only while `socket` is still the registered one,
    /// so a stale forward loop cannot evict its replacement.
    pub async fn unregister_if(&self, conversation_id: &str, socket: &EchoSocket) {
        let mut guard = self.inner.write().await;
        if guard
            .get(conversation_id)
            .is_some_and(|current| current.same_channel(socket))
        {
            guard.remove(conversation_id);
        }
    }
}

#[async_trait]
impl SubscriberRegistry for MemorySubscriberRegistry {
    async fn socket_for(&self, conversation_id: &str) -> Option<EchoSocket> {
        self.inner.read().await.get(conversation_id).cloned()
    }
}

/// Pushes accepted activities to the conversation's live UI subscriber.
#[derive(Clone)]
pub struct EchoBroadcaster {
    registry: SharedSubscriberRegistry,
}

impl EchoBroadcaster {
    pub fn new(registry: SharedSubscriberRegistry) -> Self {
        Self { registry }
    }

    /// Fire-and-forget echo of an accepted activity. Never fails the
    /// request: absent subscribers, suppressed commands, and closed
    /// sockets are all silent skips.
    pub async fn echo(&self, conversation_id: &str, activity: &Activity, activity_id: &str) {
        if suppressed(activity) {
            debug!(conversation_id, "suppressing control command echo");
            return;
        }

        let Some(socket) = self.registry.socket_for(conversation_id).await else {
            return;
        };

        let payload = match serde_json::to_string(&envelope(activity, activity_id)) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(conversation_id, error = %err, "failed to serialize echo envelope");
                return;
            }
        };

        if socket.send(payload) {
            counter!("relay_echoes_total").increment(1);
        } else {
            warn!(conversation_id, "echo subscriber gone, dropping payload");
        }
    }
}

/// The UI protocol expects a batch shape even for a single activity. The
/// assigned identifier wins over anything the caller supplied.
fn envelope(activity: &Activity, activity_id: &str) -> serde_json::Value {
    let mut stamped = activity.clone();
    stamped.id = Some(activity_id.to_string());
    json!({ "activities": [stamped] })
}

fn suppressed(activity: &Activity) -> bool {
    activity.r#type == "message" && activity.text.as_deref() == Some(INSPECT_OPEN_COMMAND)
}
