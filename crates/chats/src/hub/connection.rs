//! Per-session plumbing shared by the hub and the session loops.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tracing::info;
use uuid::Uuid;

use super::ConnectionHub;

pub type SessionId = Uuid;

/// Serialized event ready to be written to a transport.
pub type Payload = Arc<str>;

/// Why a session ended. Only the first reason recorded is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Explicit `disconnect` through the engine or hub.
    Requested,
    ClientClosed,
    IdleTimeout,
    ReadError,
    WriteError,
    WriteTimeout,
    /// Outbound queue was full when an event had to be queued.
    SlowConsumer,
    /// Outbound queue receiver was already gone.
    TransportClosed,
    ServerShutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::ClientClosed => "client_closed",
            Self::IdleTimeout => "idle_timeout",
            Self::ReadError => "read_error",
            Self::WriteError => "write_error",
            Self::WriteTimeout => "write_timeout",
            Self::SlowConsumer => "slow_consumer",
            Self::TransportClosed => "transport_closed",
            Self::ServerShutdown => "server_shutdown",
        };
        f.write_str(name)
    }
}

/// First-wins close flag with async wake-up.
#[derive(Debug, Default)]
pub struct CloseSignal {
    reason: OnceLock<DisconnectReason>,
    notify: Notify,
}

impl CloseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the close. Returns `true` only for the first caller.
    pub fn close(&self, reason: DisconnectReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub fn is_closed(&self) -> bool {
        self.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<DisconnectReason> {
        self.reason.get().copied()
    }

    /// Resolves once the signal has been closed.
    pub async fn closed(&self) -> DisconnectReason {
        loop {
            // Register interest before checking so a concurrent close is not missed.
            let notified = self.notify.notified();
            if let Some(reason) = self.reason.get() {
                return *reason;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub session_id: SessionId,
    pub chat_id: i64,
    pub user_id: i64,
}

/// Hub-side view of a session: where to queue events and how to close it.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub(crate) info: ConnectionInfo,
    pub(crate) sender: mpsc::Sender<Payload>,
    pub(crate) closer: Arc<CloseSignal>,
}

impl ConnectionHandle {
    pub fn info(&self) -> ConnectionInfo {
        self.info
    }

    pub fn session_id(&self) -> SessionId {
        self.info.session_id
    }

    pub fn chat_id(&self) -> i64 {
        self.info.chat_id
    }

    pub(crate) fn try_deliver(&self, payload: Payload) -> Result<(), mpsc::error::TrySendError<Payload>> {
        self.sender.try_send(payload)
    }

    pub(crate) fn close(&self, reason: DisconnectReason) -> bool {
        self.closer.close(reason)
    }
}

/// Session-side half of a live connection.
///
/// Owns the receiving end of the outbound queue. Dropping it without
/// terminating leaves the hub to discover the closed queue on the next
/// broadcast.
pub struct Connection {
    pub(crate) info: ConnectionInfo,
    pub(crate) outbound: mpsc::Receiver<Payload>,
    pub(crate) replies: mpsc::Sender<Payload>,
    pub(crate) closer: Arc<CloseSignal>,
    pub(crate) hub: ConnectionHub,
}

impl Connection {
    /// Build both halves around a fresh bounded queue.
    pub(crate) fn pair(
        hub: ConnectionHub,
        chat_id: i64,
        user_id: i64,
        capacity: usize,
    ) -> (Connection, ConnectionHandle) {
        let (sender, outbound) = mpsc::channel(capacity.max(1));
        let closer = Arc::new(CloseSignal::new());
        let info = ConnectionInfo {
            session_id: Uuid::new_v4(),
            chat_id,
            user_id,
        };

        let handle = ConnectionHandle {
            info,
            sender: sender.clone(),
            closer: closer.clone(),
        };
        let connection = Connection {
            info,
            outbound,
            replies: sender,
            closer,
            hub,
        };
        (connection, handle)
    }

    pub fn info(&self) -> ConnectionInfo {
        self.info
    }

    pub fn session_id(&self) -> SessionId {
        self.info.session_id
    }

    pub fn chat_id(&self) -> i64 {
        self.info.chat_id
    }

    pub fn user_id(&self) -> i64 {
        self.info.user_id
    }

    pub fn close_signal(&self) -> Arc<CloseSignal> {
        self.closer.clone()
    }

    /// Receive the next queued payload, for callers driving the queue themselves.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.outbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Payload> {
        self.outbound.try_recv().ok()
    }

    /// End the session. Only the first call unregisters and logs.
    pub async fn terminate(&self, reason: DisconnectReason) -> bool {
        terminate(&self.info, &self.closer, &self.hub, reason).await
    }
}

pub(crate) async fn terminate(
    info: &ConnectionInfo,
    closer: &CloseSignal,
    hub: &ConnectionHub,
    reason: DisconnectReason,
) -> bool {
    if !closer.close(reason) {
        return false;
    }
    hub.unregister(info.chat_id, info.session_id).await;
    info!(
        session_id = %info.session_id,
        chat_id = info.chat_id,
        user_id = info.user_id,
        %reason,
        "session terminated"
    );
    true
}
