//! Storage seam used by the delivery layer.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::entities::{Attachment, Message, NewMessage};
use crate::repos::{AttachmentRepository, MemberRepository, MessageRepository};
use crate::types::DatabaseResult;

/// Everything the chat services need from durable storage.
///
/// Implementations must make `insert_message` atomic: a message and its
/// attachments are either all visible or none are.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_message(&self, new: &NewMessage) -> DatabaseResult<Message>;

    /// Message row without attachments.
    async fn find_message(&self, chat_id: i64, message_id: i64) -> DatabaseResult<Option<Message>>;

    /// Ids newest first, strictly older than `before` when given.
    async fn list_message_ids(
        &self,
        chat_id: i64,
        before: Option<i64>,
        limit: u32,
    ) -> DatabaseResult<Vec<i64>>;

    async fn attachments_for(&self, message_id: i64) -> DatabaseResult<Vec<Attachment>>;

    /// Message with all of its attachments, read from one snapshot.
    /// `None` once the message has been deleted.
    async fn find_hydrated(&self, chat_id: i64, message_id: i64) -> DatabaseResult<Option<Message>>;

    async fn update_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> DatabaseResult<Option<Message>>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> DatabaseResult<bool>;

    async fn is_member(&self, chat_id: i64, user_id: i64) -> DatabaseResult<bool>;
}

/// [`ChatStore`] backed by the SQLite repositories.
#[derive(Clone)]
pub struct SqliteStore {
    messages: MessageRepository,
    attachments: AttachmentRepository,
    members: MemberRepository,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            messages: MessageRepository::new(pool.clone()),
            attachments: AttachmentRepository::new(pool.clone()),
            members: MemberRepository::new(pool),
        }
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn insert_message(&self, new: &NewMessage) -> DatabaseResult<Message> {
        self.messages.create_with_attachments(new).await
    }

    async fn find_message(&self, chat_id: i64, message_id: i64) -> DatabaseResult<Option<Message>> {
        self.messages.find_in_chat(chat_id, message_id).await
    }

    async fn list_message_ids(
        &self,
        chat_id: i64,
        before: Option<i64>,
        limit: u32,
    ) -> DatabaseResult<Vec<i64>> {
        self.messages.find_page_ids(chat_id, before, limit).await
    }

    async fn attachments_for(&self, message_id: i64) -> DatabaseResult<Vec<Attachment>> {
        self.attachments.find_by_message_id(message_id).await
    }

    async fn find_hydrated(&self, chat_id: i64, message_id: i64) -> DatabaseResult<Option<Message>> {
        self.messages.find_with_attachments(chat_id, message_id).await
    }

    async fn update_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> DatabaseResult<Option<Message>> {
        self.messages.update_text(chat_id, message_id, text).await
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> DatabaseResult<bool> {
        self.messages.delete(chat_id, message_id).await
    }

    async fn is_member(&self, chat_id: i64, user_id: i64) -> DatabaseResult<bool> {
        self.members.is_member(chat_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AttachmentKind, MemberRole, NewAttachment};
    use crate::repos::ChatRepository;
    use crate::test_support::test_pool;
    use std::sync::Arc;

    #[tokio::test]
    async fn store_round_trips_through_trait_object() {
        let (pool, _dir) = test_pool().await;
        let chat = ChatRepository::new(pool.clone()).create("general").await.unwrap();
        MemberRepository::new(pool.clone())
            .add(chat.id, 1, MemberRole::Member)
            .await
            .unwrap();

        let store: Arc<dyn ChatStore> = Arc::new(SqliteStore::new(pool));
        assert!(store.is_member(chat.id, 1).await.unwrap());
        assert!(!store.is_member(chat.id, 2).await.unwrap());

        let stored = store
            .insert_message(&NewMessage {
                chat_id: chat.id,
                author_id: 1,
                text: "hello".into(),
                reply_to: None,
                attachments: vec![NewAttachment::new(AttachmentKind::Audio, "https://cdn/a.ogg")],
            })
            .await
            .unwrap();

        let ids = store.list_message_ids(chat.id, None, 10).await.unwrap();
        assert_eq!(ids, vec![stored.id]);

        let found = store.find_message(chat.id, stored.id).await.unwrap().unwrap();
        assert_eq!(found.text, "hello");
        assert!(found.attachments.is_empty());

        let attachments = store.attachments_for(stored.id).await.unwrap();
        assert_eq!(attachments, stored.attachments);

        let hydrated = store.find_hydrated(chat.id, stored.id).await.unwrap().unwrap();
        assert_eq!(hydrated.attachments, stored.attachments);

        assert!(store.delete_message(chat.id, stored.id).await.unwrap());
        assert!(store.attachments_for(stored.id).await.unwrap().is_empty());
        assert!(store.find_hydrated(chat.id, stored.id).await.unwrap().is_none());
    }
}
