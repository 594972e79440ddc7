use std::sync::Arc;

use tracing::{error, info, info_span};

pub fn span_for_conversation(action: &'static str, conversation_id: &str) -> tracing::Span {
    info_span!("relay.conversation", action, conversation_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

/// One diagnostic entry attached to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            message: message.into(),
        }
    }
}

/// Fire-and-forget diagnostic sink keyed by conversation.
pub trait ActivityLogger: Send + Sync {
    fn log_message(&self, conversation_id: &str, entry: LogEntry);
}

pub type SharedActivityLogger = Arc<dyn ActivityLogger>;

/// Default sink that forwards conversation log entries to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingActivityLogger;

impl ActivityLogger for TracingActivityLogger {
    fn log_message(&self, conversation_id: &str, entry: LogEntry) {
        match entry.level {
            LogLevel::Info => {
                info!(target: "relay.conversation", conversation_id, "{}", entry.message)
            }
            LogLevel::Error => {
                error!(target: "relay.conversation", conversation_id, "{}", entry.message)
            }
        }
    }
}
