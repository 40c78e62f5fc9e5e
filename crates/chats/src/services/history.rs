//! Paginated history with bounded concurrent attachment hydration.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use sendiz_config::DeliveryConfig;
use sendiz_database::{ChatStore, Message};

use crate::types::{ChatError, ChatResult};

/// Keyset position in a chat's history. `0` starts at the newest message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(pub i64);

impl PageCursor {
    pub const NEWEST: PageCursor = PageCursor(0);

    fn before(self) -> Option<i64> {
        (self.0 > 0).then_some(self.0)
    }
}

impl From<i64> for PageCursor {
    fn from(value: i64) -> Self {
        PageCursor(value.max(0))
    }
}

/// One page of history, newest first.
///
/// Consumed once: iterate it by value or destructure it.
#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Cursor for the next older page, absent once the history is exhausted.
    pub next_cursor: Option<PageCursor>,
}

impl MessagePage {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl IntoIterator for MessagePage {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

#[derive(Clone)]
pub struct HistoryReader {
    store: Arc<dyn ChatStore>,
    concurrency: usize,
    lookup_timeout: Duration,
    default_page_size: u32,
    max_page_size: u32,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn ChatStore>, settings: &DeliveryConfig) -> Self {
        Self {
            store,
            concurrency: settings.hydration_concurrency.max(1),
            lookup_timeout: Duration::from_millis(settings.hydration_timeout_ms),
            default_page_size: settings.default_page_size.max(1),
            max_page_size: settings.max_page_size.max(1),
        }
    }

    /// Fetch a page of fully hydrated messages.
    ///
    /// At most `hydration_concurrency` lookups are in flight. Each lookup
    /// reads a message and its attachments from one snapshot. A single
    /// failed or timed-out lookup fails the whole page; a message deleted
    /// after the id scan is left out.
    pub async fn get_messages(
        &self,
        chat_id: i64,
        cursor: PageCursor,
        limit: u32,
    ) -> ChatResult<MessagePage> {
        let limit = self.effective_limit(limit);
        let ids = self
            .store
            .list_message_ids(chat_id, cursor.before(), limit)
            .await?;

        let hydrated: Vec<Option<Message>> = stream::iter(ids.iter().copied())
            .map(|message_id| self.hydrate(chat_id, message_id))
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        let messages: Vec<Message> = hydrated.into_iter().flatten().collect();

        let next_cursor = if ids.len() as u32 == limit {
            ids.last().copied().map(PageCursor)
        } else {
            None
        };

        debug!(chat_id, cursor = cursor.0, limit, returned = messages.len(), "history page loaded");

        Ok(MessagePage {
            messages,
            next_cursor,
        })
    }

    fn effective_limit(&self, limit: u32) -> u32 {
        if limit == 0 {
            self.default_page_size.min(self.max_page_size)
        } else {
            limit.min(self.max_page_size)
        }
    }

    async fn hydrate(&self, chat_id: i64, message_id: i64) -> ChatResult<Option<Message>> {
        match timeout(self.lookup_timeout, self.store.find_hydrated(chat_id, message_id)).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(err)) => Err(ChatError::hydration(message_id, err.to_string())),
            Err(_) => {
                warn!(chat_id, message_id, "attachment hydration timed out");
                Err(ChatError::hydration(message_id, "lookup timed out"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_zero_means_newest() {
        assert_eq!(PageCursor::NEWEST.before(), None);
        assert_eq!(PageCursor(42).before(), Some(42));
        assert_eq!(PageCursor::from(-5), PageCursor::NEWEST);
    }
}
