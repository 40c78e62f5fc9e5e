//! Message entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attachment::{Attachment, NewAttachment};

/// A persisted unit of chat content.
///
/// `id` and `created_at` are assigned by the store when the message is
/// committed. Only `text` and `edited` change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
    pub reply_to: Option<i64>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Validated input for a single atomic "message plus attachments" write.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: i64,
    pub author_id: i64,
    pub text: String,
    pub reply_to: Option<i64>,
    pub attachments: Vec<NewAttachment>,
}
