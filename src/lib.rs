#![forbid(unsafe_code)]

//! Activity relay: forwards client-submitted conversational activities to
//! a bot endpoint, interprets the bot's synchronous response into a
//! client-facing result, and echoes accepted activities to the
//! conversation's live WebSocket subscriber.

pub mod activity;
pub mod bot;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod echo;
pub mod error;
pub mod http;
pub mod stream;
pub mod telemetry;

pub use activity::Activity;
pub use config::RelayConfig;
pub use dispatch::{DispatchResult, dispatch, status_code_family};
pub use echo::{EchoBroadcaster, INSPECT_OPEN_COMMAND};
pub use error::RelayError;
pub use crate::http::{AppState, router};
