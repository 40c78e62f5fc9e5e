//! The chat delivery boundary: submit, history, connect and disconnect.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use sendiz_config::DeliveryConfig;
use sendiz_database::{ChatStore, Message};

use crate::hub::{Connection, ConnectionHub, SessionId};
use crate::services::{HistoryReader, MessageDraft, MessagePage, PageCursor, PersistenceGateway};
use crate::types::{ChatError, ChatResult, ServerEvent};

/// Wires persistence, history and fan-out together.
///
/// Cheap to clone. Build one per process and hand it to the transport.
#[derive(Clone)]
pub struct ChatEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: Arc<dyn ChatStore>,
    persistence: PersistenceGateway,
    history: HistoryReader,
    hub: ConnectionHub,
    settings: DeliveryConfig,
    // Held from commit through broadcast so fan-out order matches commit order.
    ordering: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatEngine {
    pub fn new(store: Arc<dyn ChatStore>, hub: ConnectionHub, settings: DeliveryConfig) -> Self {
        let persistence = PersistenceGateway::new(store.clone(), &settings);
        let history = HistoryReader::new(store.clone(), &settings);
        Self {
            inner: Arc::new(EngineInner {
                store,
                persistence,
                history,
                hub,
                settings,
                ordering: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn hub(&self) -> &ConnectionHub {
        &self.inner.hub
    }

    pub fn settings(&self) -> &DeliveryConfig {
        &self.inner.settings
    }

    /// Persist a message, then deliver it to every live session of the chat.
    ///
    /// The returned message is committed; delivery problems never turn it
    /// into an error.
    pub async fn submit(
        &self,
        chat_id: i64,
        author_id: i64,
        draft: MessageDraft,
    ) -> ChatResult<Message> {
        self.ensure_member(chat_id, author_id).await?;

        self.ordered(chat_id, async {
            let message = self
                .inner
                .persistence
                .save_message(chat_id, author_id, draft)
                .await?;
            self.fan_out(
                chat_id,
                ServerEvent::MessageCreated {
                    message: message.clone(),
                },
            )
            .await;
            Ok::<_, ChatError>(message)
        })
        .await
    }

    pub async fn fetch_history(
        &self,
        chat_id: i64,
        user_id: i64,
        cursor: PageCursor,
        limit: u32,
    ) -> ChatResult<MessagePage> {
        self.ensure_member(chat_id, user_id).await?;
        self.inner.history.get_messages(chat_id, cursor, limit).await
    }

    /// Fail with `AccessDenied` unless `user_id` belongs to the chat.
    pub async fn authorize(&self, chat_id: i64, user_id: i64) -> ChatResult<()> {
        self.ensure_member(chat_id, user_id).await
    }

    /// Open a session for a chat member. A `hello` event is already queued.
    pub async fn connect(&self, chat_id: i64, user_id: i64) -> ChatResult<Connection> {
        self.ensure_member(chat_id, user_id).await?;

        let connection = self
            .inner
            .hub
            .open(chat_id, user_id, self.inner.settings.outbound_queue_capacity)
            .await;

        let hello = ServerEvent::Hello {
            session_id: connection.session_id(),
            chat_id,
        }
        .to_payload()?;
        if connection.replies.try_send(hello).is_err() {
            return Err(ChatError::internal("fresh session queue rejected hello"));
        }

        info!(chat_id, user_id, session_id = %connection.session_id(), "session opened");
        Ok(connection)
    }

    pub async fn disconnect(&self, session_id: SessionId) -> bool {
        self.inner.hub.disconnect(session_id).await
    }

    /// Replace the text of a message owned by `user_id`.
    pub async fn edit_message(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
        text: String,
    ) -> ChatResult<Message> {
        self.ensure_member(chat_id, user_id).await?;
        let existing = self.owned_message(chat_id, user_id, message_id).await?;

        let attachments = self.inner.store.attachments_for(existing.id).await?;
        self.inner
            .persistence
            .validate_edit(&text, !attachments.is_empty())?;

        let message = self
            .ordered(chat_id, async {
                let updated = self
                    .inner
                    .store
                    .update_message_text(chat_id, message_id, &text)
                    .await?
                    .ok_or(ChatError::MessageNotFound { id: message_id })?;
                let message = Message {
                    attachments,
                    ..updated
                };
                self.fan_out(
                    chat_id,
                    ServerEvent::MessageEdited {
                        message: message.clone(),
                    },
                )
                .await;
                Ok::<_, ChatError>(message)
            })
            .await?;

        info!(chat_id, user_id, message_id, "message edited");
        Ok(message)
    }

    /// Delete a message owned by `user_id` together with its attachments.
    pub async fn delete_message(&self, chat_id: i64, user_id: i64, message_id: i64) -> ChatResult<()> {
        self.ensure_member(chat_id, user_id).await?;
        self.owned_message(chat_id, user_id, message_id).await?;

        self.ordered(chat_id, async {
            if !self.inner.store.delete_message(chat_id, message_id).await? {
                return Err(ChatError::MessageNotFound { id: message_id });
            }
            self.fan_out(chat_id, ServerEvent::MessageDeleted { chat_id, message_id })
                .await;
            Ok::<_, ChatError>(())
        })
        .await?;

        info!(chat_id, user_id, message_id, "message deleted");
        Ok(())
    }

    async fn ensure_member(&self, chat_id: i64, user_id: i64) -> ChatResult<()> {
        if self.inner.store.is_member(chat_id, user_id).await? {
            Ok(())
        } else {
            Err(ChatError::access_denied(format!(
                "user {user_id} is not a member of chat {chat_id}"
            )))
        }
    }

    async fn owned_message(&self, chat_id: i64, user_id: i64, message_id: i64) -> ChatResult<Message> {
        let message = self
            .inner
            .store
            .find_message(chat_id, message_id)
            .await?
            .ok_or(ChatError::MessageNotFound { id: message_id })?;

        if message.author_id != user_id {
            return Err(ChatError::access_denied("only the author can change a message"));
        }
        Ok(message)
    }

    async fn fan_out(&self, chat_id: i64, event: ServerEvent) {
        if let Err(err) = self.inner.hub.broadcast(chat_id, &event).await {
            warn!(chat_id, error = %err, "failed to broadcast event");
        }
    }

    /// Run `work` while holding the chat's ordering lock.
    async fn ordered<T, F>(&self, chat_id: i64, work: F) -> ChatResult<T>
    where
        F: Future<Output = ChatResult<T>>,
    {
        let lock = {
            let mut ordering = self.inner.ordering.lock().await;
            ordering.entry(chat_id).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        let result = work.await;
        drop(guard);

        // Forget the lock once nobody holds or waits on it.
        let mut ordering = self.inner.ordering.lock().await;
        if ordering
            .get(&chat_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            ordering.remove(&chat_id);
        }
        result
    }
}
