//! Wire events exchanged with live sessions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sendiz_database::{Message, NewAttachment};

/// Frames a client may send over an open session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Ping,
    SendMessage {
        /// Echoed back in the `ack` so the client can match it to its draft.
        #[serde(default)]
        client_ref: Option<String>,
        #[serde(default)]
        text: String,
        #[serde(default)]
        reply_to: Option<i64>,
        #[serde(default)]
        attachments: Vec<NewAttachment>,
    },
}

/// Frames the server pushes to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Hello {
        session_id: Uuid,
        chat_id: i64,
    },
    Pong,
    Ack {
        client_ref: Option<String>,
        message_id: i64,
    },
    Error {
        code: String,
        message: String,
    },
    MessageCreated {
        message: Message,
    },
    MessageEdited {
        message: Message,
    },
    MessageDeleted {
        chat_id: i64,
        message_id: i64,
    },
}

impl ServerEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn to_payload(&self) -> serde_json::Result<std::sync::Arc<str>> {
        serde_json::to_string(self).map(Into::into)
    }
}
