use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Conversational activity exchanged between a client and a bot.
///
/// Only the fields the relay inspects are typed; everything else the
/// client sends round-trips untouched through `extra`. Identity is
/// assigned by the conversation handle at dispatch time, never by the
/// caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    /// Creates a bare activity with the provided type.
    pub fn new(r#type: impl Into<String>) -> Self {
        Self {
            id: None,
            r#type: r#type.into(),
            text: None,
            from: None,
            conversation: None,
            extra: Map::new(),
        }
    }

    /// Creates a `message` activity with the given text.
    pub fn message(text: impl Into<String>) -> Self {
        let mut activity = Self::new("message");
        activity.text = Some(text.into());
        activity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_round_trip_untouched() {
        let raw = json!({
            "type": "message",
            "text": "hello",
            "locale": "en-GB",
            "channelData": {"clientTimestamp": "2024-01-01T00:00:00Z"},
            "attachments": [{"contentType": "image/png"}]
        });

        let activity: Activity = serde_json::from_value(raw.clone()).expect("activity");
        assert_eq!(activity.r#type, "message");
        assert_eq!(activity.text.as_deref(), Some("hello"));
        assert_eq!(activity.extra["locale"], "en-GB");

        let back = serde_json::to_value(&activity).expect("serialize");
        assert_eq!(back, raw);
    }

    #[test]
    fn caller_supplied_id_is_a_typed_field() {
        let activity: Activity =
            serde_json::from_value(json!({"type": "message", "id": "client-1"})).expect("activity");
        assert_eq!(activity.id.as_deref(), Some("client-1"));
        assert!(activity.extra.is_empty());
    }
}
