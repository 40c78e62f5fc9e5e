//! Validated, atomic message writes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use sendiz_config::DeliveryConfig;
use sendiz_database::{ChatStore, Message, NewAttachment, NewMessage};

use crate::types::{ChatError, ChatResult};

pub const MAX_LINK_BYTES: usize = 2048;

/// A message as composed by a client, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageDraft {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reply_to: Option<i64>,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
}

impl MessageDraft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Turns drafts into committed messages. Never broadcasts.
#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn ChatStore>,
    max_text_length: usize,
    max_attachments: usize,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn ChatStore>, settings: &DeliveryConfig) -> Self {
        Self {
            store,
            max_text_length: settings.max_text_length,
            max_attachments: settings.max_attachments,
        }
    }

    /// Validate and durably store a message with its attachments.
    ///
    /// The write is all-or-nothing. Store failures are surfaced without
    /// retrying.
    pub async fn save_message(
        &self,
        chat_id: i64,
        author_id: i64,
        draft: MessageDraft,
    ) -> ChatResult<Message> {
        self.validate(&draft)?;

        let new = NewMessage {
            chat_id,
            author_id,
            text: draft.text,
            reply_to: draft.reply_to,
            attachments: draft.attachments,
        };

        match self.store.insert_message(&new).await {
            Ok(message) => {
                info!(
                    chat_id,
                    author_id,
                    message_id = message.id,
                    attachments = message.attachments.len(),
                    "message persisted"
                );
                Ok(message)
            }
            Err(err) => {
                warn!(chat_id, author_id, error = %err, "failed to persist message");
                Err(err.into())
            }
        }
    }

    /// Check a replacement text for an existing message.
    pub fn validate_edit(&self, text: &str, has_attachments: bool) -> ChatResult<()> {
        self.validate_text(text, has_attachments)
    }

    fn validate(&self, draft: &MessageDraft) -> ChatResult<()> {
        self.validate_text(&draft.text, !draft.attachments.is_empty())?;

        if draft.attachments.len() > self.max_attachments {
            return Err(ChatError::validation(format!(
                "too many attachments (max {})",
                self.max_attachments
            )));
        }

        for (index, attachment) in draft.attachments.iter().enumerate() {
            if attachment.link.trim().is_empty() {
                return Err(ChatError::validation(format!(
                    "attachment {index} has an empty link"
                )));
            }
            if attachment.link.len() > MAX_LINK_BYTES {
                return Err(ChatError::validation(format!(
                    "attachment {index} link too long (max {MAX_LINK_BYTES} bytes)"
                )));
            }
        }

        if let Some(reply_to) = draft.reply_to {
            if reply_to <= 0 {
                return Err(ChatError::validation("reply_to must be a message id"));
            }
        }

        Ok(())
    }

    fn validate_text(&self, text: &str, has_attachments: bool) -> ChatResult<()> {
        if text.trim().is_empty() && !has_attachments {
            return Err(ChatError::validation(
                "message must have text or at least one attachment",
            ));
        }

        if text.chars().count() > self.max_text_length {
            return Err(ChatError::validation(format!(
                "message text too long (max {} characters)",
                self.max_text_length
            )));
        }

        Ok(())
    }
}
