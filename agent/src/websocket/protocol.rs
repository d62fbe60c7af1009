//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and tagged by a snake_case `type` field.

use outbox_engine::{DrainReport, EngineStatus};
use serde::{Deserialize, Serialize};

/// Messages sent from client to agent.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Drain the outbox now.
    Drain {
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Ask for the current status.
    Status,

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from agent to client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Engine status; pushed on every change and sent on request.
    Status {
        #[serde(flatten)]
        status: EngineStatus,
    },

    /// Outcome of a requested drain.
    DrainReport {
        report: DrainReport,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    pub fn status(status: EngineStatus) -> Self {
        ServerMessage::Status { status }
    }
}
