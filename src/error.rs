use anyhow::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::bot::BotCallError;

/// Relay-level failures that terminate a request.
///
/// Bot rejections are not errors: the dispatcher recovers them into
/// [`crate::dispatch::DispatchResult::Rejected`] and the client receives
/// the bot's own status and payload. This type covers the two paths a
/// client must be able to tell apart from that: the conversation was
/// never resolved, or the relay itself failed.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("conversation not found")]
    NotFound,
    #[error("internal server error")]
    Internal(#[source] Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::NotFound => StatusCode::NOT_FOUND,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BotCallError> for RelayError {
    fn from(err: BotCallError) -> Self {
        RelayError::Internal(err.into())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            // The client contract fixes this literal diagnostic body.
            RelayError::NotFound => (status, "conversation not found").into_response(),
            RelayError::Internal(err) => {
                tracing::error!(error = %err, "relay fault");
                (
                    status,
                    Json(ErrorBody {
                        error: "internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}
