use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::{
    activity::Activity,
    config::RelayConfig,
    conversation::SharedConversationDirectory,
    dispatch::{self, DispatchResult, ErrorPayload},
    echo::{EchoBroadcaster, MemorySubscriberRegistry},
    error::RelayError,
    stream,
    telemetry::{self, LogEntry, SharedActivityLogger, TracingActivityLogger},
};

#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub directory: SharedConversationDirectory,
    pub subscribers: Arc<MemorySubscriberRegistry>,
    pub broadcaster: EchoBroadcaster,
    pub logger: SharedActivityLogger,
}

impl AppState {
    pub fn new(config: RelayConfig, directory: SharedConversationDirectory) -> Self {
        let subscribers = Arc::new(MemorySubscriberRegistry::new());
        let broadcaster = EchoBroadcaster::new(subscribers.clone());
        Self {
            config,
            directory,
            subscribers,
            broadcaster,
            logger: Arc::new(TracingActivityLogger),
        }
    }

    pub fn with_logger(mut self, logger: SharedActivityLogger) -> Self {
        self.logger = logger;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/conversations", post(create_conversation))
        .route("/conversations/{id}/activities", post(post_activity))
        .route("/conversations/{id}/stream", get(stream::conversation_stream))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
pub struct ConversationPath {
    pub id: String,
}

#[derive(Serialize)]
struct CreateConversationResponse {
    #[serde(rename = "conversationId")]
    conversation_id: String,
}

async fn create_conversation(
    State(state): State<AppState>,
) -> Result<Json<CreateConversationResponse>, RelayError> {
    let conversation_id = state
        .directory
        .create(state.config.bot_endpoint())
        .await
        .map_err(RelayError::Internal)?;
    counter!("relay_conversations_created_total").increment(1);
    Ok(Json(CreateConversationResponse { conversation_id }))
}

#[derive(Serialize)]
struct ActivityAck {
    id: String,
}

async fn post_activity(
    State(state): State<AppState>,
    Path(path): Path<ConversationPath>,
    Json(activity): Json<Activity>,
) -> Response {
    let span = telemetry::span_for_conversation("activities.post", &path.id);
    handle_post_activity(state, path.id, activity)
        .instrument(span)
        .await
}

/// Request orchestration: resolve, dispatch, respond, then echo. Bot
/// rejections keep the bot's status and payload; relay faults collapse
/// into the generic 500 so the client can tell the two apart.
async fn handle_post_activity(
    state: AppState,
    conversation_id: String,
    activity: Activity,
) -> Response {
    let Some(conversation) = state.directory.resolve(&conversation_id).await else {
        state.logger.log_message(
            &conversation_id,
            LogEntry::error("Cannot post activity. Conversation not found."),
        );
        counter!("relay_errors_total", "kind" => "conversation_not_found").increment(1);
        return RelayError::NotFound.into_response();
    };

    match dispatch::dispatch(conversation.as_ref(), &activity, state.logger.as_ref()).await {
        Ok(DispatchResult::Accepted {
            activity_id,
            status,
        }) => {
            let response = (status, Json(ActivityAck { id: activity_id.clone() })).into_response();
            // The push is queued after the client response is fixed; its
            // delivery never changes the request outcome.
            state
                .broadcaster
                .echo(&conversation_id, &activity, &activity_id)
                .await;
            response
        }
        Ok(DispatchResult::Rejected { status, payload }) => rejection_response(status, payload),
        Err(err) => RelayError::from(err).into_response(),
    }
}

fn rejection_response(status: StatusCode, payload: ErrorPayload) -> Response {
    match payload {
        ErrorPayload::Text(text) => (status, text).into_response(),
        ErrorPayload::Details(details) => (status, Json(details)).into_response(),
    }
}
