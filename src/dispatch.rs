use http::StatusCode;
use metrics::counter;
use serde::Serialize;

use crate::{
    activity::Activity,
    bot::{BotCallError, BotReplyBody},
    conversation::ConversationHandle,
    telemetry::{ActivityLogger, LogEntry},
};

const SUCCESS_FAMILY: u16 = 200;

/// True when `code` belongs to the same hundred-family as `family`.
pub fn status_code_family(code: u16, family: u16) -> bool {
    code / 100 == family / 100
}

/// Uniform outcome of forwarding one activity to the bot. Exactly one of
/// the two shapes exists per request; nothing is carried across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// Bot accepted the activity; respond with the assigned identifier.
    Accepted {
        activity_id: String,
        status: StatusCode,
    },
    /// Bot rejected the activity; respond with its payload.
    Rejected {
        status: StatusCode,
        payload: ErrorPayload,
    },
}

/// Client-facing error payload extracted from the bot's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPayload {
    /// Bot exposed a textual body; relayed verbatim as plain text.
    Text(String),
    /// Synthesized from the response's message/status fields.
    Details(ErrorDetails),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Forwards `activity` to the conversation's bot endpoint and normalizes
/// the outcome.
///
/// Bot-side rejections are recovered into [`DispatchResult::Rejected`] and
/// never surface as `Err`; only unexpected transport faults propagate, and
/// the caller converts those to a generic server error.
pub async fn dispatch(
    conversation: &dyn ConversationHandle,
    activity: &Activity,
    logger: &dyn ActivityLogger,
) -> Result<DispatchResult, BotCallError> {
    // The conversation always records the activity in this flow.
    let reply = conversation.post_activity_to_bot(activity, true).await?;

    let accepted = reply
        .status
        .filter(|code| status_code_family(*code, SUCCESS_FAMILY))
        .and_then(|code| StatusCode::from_u16(code).ok());
    if let Some(status) = accepted {
        return Ok(DispatchResult::Accepted {
            activity_id: reply.activity_id,
            status,
        });
    }

    if matches!(reply.status, Some(401) | Some(403)) {
        logger.log_message(
            conversation.conversation_id(),
            LogEntry::error("Cannot post activity. Unauthorized."),
        );
        counter!("relay_errors_total", "kind" => "bot_unauthorized").increment(1);
    } else {
        counter!("relay_errors_total", "kind" => "bot_rejected").increment(1);
    }

    // A status the bot never supplied, or one outside the representable
    // range (zero included), is served to the client as 500.
    let status = reply
        .status
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let payload = match reply.body {
        BotReplyBody::Text(text) => ErrorPayload::Text(text),
        BotReplyBody::Fields { message, status } => {
            ErrorPayload::Details(ErrorDetails { message, status })
        }
        BotReplyBody::Empty => ErrorPayload::Details(ErrorDetails {
            message: None,
            status: None,
        }),
    };

    Ok(DispatchResult::Rejected { status, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::BotReply;
    use crate::telemetry::LogLevel;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedConversation {
        status: Option<u16>,
        body: BotReplyBody,
    }

    #[async_trait]
    impl ConversationHandle for ScriptedConversation {
        fn conversation_id(&self) -> &str {
            "conv-1"
        }

        async fn post_activity_to_bot(
            &self,
            _activity: &Activity,
            record_activity: bool,
        ) -> Result<BotReply, BotCallError> {
            assert!(record_activity);
            Ok(BotReply {
                activity_id: "a1".to_string(),
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        entries: Mutex<Vec<(String, LogEntry)>>,
    }

    impl ActivityLogger for RecordingLogger {
        fn log_message(&self, conversation_id: &str, entry: LogEntry) {
            self.entries
                .lock()
                .unwrap()
                .push((conversation_id.to_string(), entry));
        }
    }

    async fn run(status: Option<u16>, body: BotReplyBody) -> (DispatchResult, RecordingLogger) {
        let conversation = ScriptedConversation { status, body };
        let logger = RecordingLogger::default();
        let result = dispatch(&conversation, &Activity::message("hi"), &logger)
            .await
            .expect("dispatch");
        (result, logger)
    }

    #[test]
    fn family_holds_for_the_whole_hundred_block() {
        for code in 0..=999u16 {
            assert_eq!(
                status_code_family(code, 200),
                (200..=299).contains(&code),
                "code {code}"
            );
        }
        assert!(status_code_family(404, 400));
        assert!(!status_code_family(404, 500));
    }

    #[tokio::test]
    async fn success_family_yields_accepted_with_bot_status() {
        for code in [200u16, 201, 204, 299] {
            let (result, _) = run(Some(code), BotReplyBody::Empty).await;
            match result {
                DispatchResult::Accepted {
                    activity_id,
                    status,
                } => {
                    assert_eq!(activity_id, "a1");
                    assert_eq!(status.as_u16(), code);
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn textual_error_body_is_relayed_verbatim() {
        let (result, logger) = run(
            Some(502),
            BotReplyBody::Text("upstream fell over".to_string()),
        )
        .await;
        assert_eq!(
            result,
            DispatchResult::Rejected {
                status: StatusCode::BAD_GATEWAY,
                payload: ErrorPayload::Text("upstream fell over".to_string()),
            }
        );
        assert!(logger.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn field_shaped_error_is_synthesized() {
        let (result, _) = run(
            Some(400),
            BotReplyBody::Fields {
                message: Some("bad activity".to_string()),
                status: Some(400),
            },
        )
        .await;
        match result {
            DispatchResult::Rejected { status, payload } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                let ErrorPayload::Details(details) = payload else {
                    panic!("expected details payload");
                };
                assert_eq!(
                    serde_json::to_value(&details).unwrap(),
                    serde_json::json!({"message": "bad activity", "status": 400})
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_body_synthesizes_an_empty_details_object() {
        let (result, _) = run(Some(503), BotReplyBody::Empty).await;
        let DispatchResult::Rejected { payload, .. } = result else {
            panic!("expected rejection");
        };
        let ErrorPayload::Details(details) = payload else {
            panic!("expected details payload");
        };
        assert_eq!(serde_json::to_value(&details).unwrap(), serde_json::json!({}));
    }

    #[tokio::test]
    async fn unauthorized_statuses_produce_a_distinguished_log_entry() {
        for code in [401u16, 403] {
            let (result, logger) = run(Some(code), BotReplyBody::Text("denied".into())).await;
            let DispatchResult::Rejected { status, payload } = result else {
                panic!("expected rejection");
            };
            assert_eq!(status.as_u16(), code);
            assert_eq!(payload, ErrorPayload::Text("denied".to_string()));

            let entries = logger.entries.lock().unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].0, "conv-1");
            assert_eq!(entries[0].1.level, LogLevel::Error);
            assert_eq!(entries[0].1.message, "Cannot post activity. Unauthorized.");
        }
    }

    #[tokio::test]
    async fn absent_or_zero_status_coerces_to_internal_server_error() {
        for status in [None, Some(0u16)] {
            let (result, _) = run(status, BotReplyBody::Empty).await;
            let DispatchResult::Rejected { status, .. } = result else {
                panic!("expected rejection");
            };
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[tokio::test]
    async fn repeated_dispatch_yields_independent_results() {
        let conversation = ScriptedConversation {
            status: Some(200),
            body: BotReplyBody::Empty,
        };
        let logger = RecordingLogger::default();
        let activity = Activity::message("same payload");

        let first = dispatch(&conversation, &activity, &logger).await.unwrap();
        let second = dispatch(&conversation, &activity, &logger).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(activity.id, None);
    }
}
