//! Process-wide registry of live sessions per chat.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::connection::{Connection, ConnectionHandle, DisconnectReason, SessionId};
use crate::types::{ChatResult, ServerEvent};

#[derive(Default)]
struct Registry {
    chats: HashMap<i64, HashMap<SessionId, ConnectionHandle>>,
    /// Reverse index so a session can be found without knowing its chat.
    sessions: HashMap<SessionId, i64>,
}

impl Registry {
    fn remove(&mut self, chat_id: i64, session_id: SessionId) -> Option<ConnectionHandle> {
        let members = self.chats.get_mut(&chat_id)?;
        let handle = members.remove(&session_id)?;
        if members.is_empty() {
            self.chats.remove(&chat_id);
        }
        if self.sessions.get(&session_id) == Some(&chat_id) {
            self.sessions.remove(&session_id);
        }
        Some(handle)
    }
}

/// Outcome of a single broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Maps chats to their connected sessions and fans events out to them.
///
/// Cheap to clone; all clones share one registry guarded by one lock.
#[derive(Clone, Default)]
pub struct ConnectionHub {
    inner: Arc<Mutex<Registry>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for `user_id` in `chat_id` and register it.
    pub async fn open(&self, chat_id: i64, user_id: i64, queue_capacity: usize) -> Connection {
        let (connection, handle) = Connection::pair(self.clone(), chat_id, user_id, queue_capacity);
        self.register(handle).await;
        connection
    }

    /// Add a session to its chat. A session already registered elsewhere is moved.
    pub async fn register(&self, handle: ConnectionHandle) {
        let session_id = handle.session_id();
        let chat_id = handle.chat_id();

        let mut registry = self.inner.lock().await;
        if let Some(previous) = registry.sessions.get(&session_id).copied() {
            if previous != chat_id {
                registry.remove(previous, session_id);
                debug!(%session_id, from = previous, to = chat_id, "session moved between chats");
            }
        }
        registry.sessions.insert(session_id, chat_id);
        registry
            .chats
            .entry(chat_id)
            .or_default()
            .insert(session_id, handle);

        info!(%session_id, chat_id, "session registered");
    }

    /// Remove a session. Safe to call any number of times.
    pub async fn unregister(&self, chat_id: i64, session_id: SessionId) -> bool {
        let removed = self.inner.lock().await.remove(chat_id, session_id).is_some();
        if removed {
            debug!(%session_id, chat_id, "session unregistered");
        }
        removed
    }

    /// Remove a session wherever it is registered and signal it to close.
    pub async fn disconnect(&self, session_id: SessionId) -> bool {
        let handle = {
            let mut registry = self.inner.lock().await;
            match registry.sessions.get(&session_id).copied() {
                Some(chat_id) => registry.remove(chat_id, session_id),
                None => None,
            }
        };

        match handle {
            Some(handle) => {
                handle.close(DisconnectReason::Requested);
                info!(%session_id, chat_id = handle.chat_id(), "session disconnected");
                true
            }
            None => false,
        }
    }

    /// Queue `event` for every session in `chat_id`.
    ///
    /// Never waits on a recipient: a session whose queue is full or gone is
    /// removed and told to close, and the others still receive the event.
    pub async fn broadcast(&self, chat_id: i64, event: &ServerEvent) -> ChatResult<BroadcastReport> {
        let payload = event.to_payload()?;
        let mut report = BroadcastReport::default();

        let mut registry = self.inner.lock().await;
        let Some(members) = registry.chats.get(&chat_id) else {
            return Ok(report);
        };

        let mut evicted = Vec::new();
        for (session_id, handle) in members {
            match handle.try_deliver(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    evicted.push((*session_id, DisconnectReason::SlowConsumer))
                }
                Err(TrySendError::Closed(_)) => {
                    evicted.push((*session_id, DisconnectReason::TransportClosed))
                }
            }
        }

        for (session_id, reason) in evicted {
            if let Some(handle) = registry.remove(chat_id, session_id) {
                handle.close(reason);
                report.dropped += 1;
                warn!(%session_id, chat_id, %reason, "dropping session during broadcast");
            }
        }

        debug!(chat_id, delivered = report.delivered, dropped = report.dropped, "broadcast complete");
        Ok(report)
    }

    /// Close every session. Used on process shutdown.
    pub async fn shutdown(&self) -> usize {
        let handles: Vec<ConnectionHandle> = {
            let mut registry = self.inner.lock().await;
            registry.sessions.clear();
            registry
                .chats
                .drain()
                .flat_map(|(_, members)| members.into_values())
                .collect()
        };

        for handle in &handles {
            handle.close(DisconnectReason::ServerShutdown);
        }
        info!(sessions = handles.len(), "connection hub shut down");
        handles.len()
    }

    pub async fn connection_count(&self, chat_id: i64) -> usize {
        self.inner
            .lock()
            .await
            .chats
            .get(&chat_id)
            .map_or(0, HashMap::len)
    }

    pub async fn is_registered(&self, session_id: SessionId) -> bool {
        self.inner.lock().await.sessions.contains_key(&session_id)
    }
}
