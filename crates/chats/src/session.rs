//! Reader and writer loops for one live session.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::engine::ChatEngine;
use crate::hub::connection::{terminate, ConnectionInfo};
use crate::hub::{CloseSignal, Connection, ConnectionHub, DisconnectReason, Payload};
use crate::services::MessageDraft;
use crate::types::{ClientEvent, ServerEvent};

#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Close,
    /// Control or binary frames the session ignores.
    Other,
}

/// Incoming half of a transport.
#[async_trait]
pub trait FrameSource: Send {
    /// `None` once the peer is gone.
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>>;
}

/// Outgoing half of a transport.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, payload: Payload) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Drive a session until either side ends it.
///
/// The reader handles client events and the writer drains the outbound
/// queue. Whichever fails first terminates the session; the other loop
/// observes the close signal and stops.
pub async fn run_session<S, K>(
    engine: ChatEngine,
    connection: Connection,
    mut source: S,
    mut sink: K,
) -> DisconnectReason
where
    S: FrameSource,
    K: FrameSink,
{
    let Connection {
        info,
        mut outbound,
        replies,
        closer,
        hub,
    } = connection;

    let idle_timeout = Duration::from_secs(engine.settings().idle_timeout_secs);
    let write_timeout = Duration::from_millis(engine.settings().write_timeout_ms);
    let session = SessionContext {
        info: &info,
        closer: &closer,
        hub: &hub,
    };

    let reader = async {
        loop {
            let next = tokio::select! {
                _ = session.closer.closed() => break,
                next = timeout(idle_timeout, source.next_frame()) => next,
            };

            let frame = match next {
                Err(_) => {
                    session.terminate(DisconnectReason::IdleTimeout).await;
                    break;
                }
                Ok(None) => {
                    session.terminate(DisconnectReason::ClientClosed).await;
                    break;
                }
                Ok(Some(Err(err))) => {
                    warn!(session_id = %info.session_id, error = %err, "session read failed");
                    session.terminate(DisconnectReason::ReadError).await;
                    break;
                }
                Ok(Some(Ok(frame))) => frame,
            };

            let reply = match frame {
                InboundFrame::Close => {
                    session.terminate(DisconnectReason::ClientClosed).await;
                    break;
                }
                InboundFrame::Other => continue,
                InboundFrame::Text(text) => handle_text(&engine, &info, &text).await,
            };

            let payload = match reply.to_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(session_id = %info.session_id, error = %err, "failed to encode reply");
                    continue;
                }
            };

            match replies.try_send(payload) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    session.terminate(DisconnectReason::SlowConsumer).await;
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    session.terminate(DisconnectReason::TransportClosed).await;
                    break;
                }
            }
        }
    };

    let writer = async {
        loop {
            let payload = tokio::select! {
                _ = session.closer.closed() => break,
                payload = outbound.recv() => payload,
            };
            let Some(payload) = payload else {
                session.terminate(DisconnectReason::TransportClosed).await;
                break;
            };

            match timeout(write_timeout, sink.send_text(payload)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(session_id = %info.session_id, error = %err, "session write failed");
                    session.terminate(DisconnectReason::WriteError).await;
                    break;
                }
                Err(_) => {
                    session.terminate(DisconnectReason::WriteTimeout).await;
                    break;
                }
            }
        }

        if let Ok(Err(err)) = timeout(write_timeout, sink.close()).await {
            debug!(session_id = %info.session_id, error = %err, "transport close failed");
        }
    };

    tokio::join!(reader, writer);

    let reason = closer.reason().unwrap_or(DisconnectReason::ClientClosed);
    hub.unregister(info.chat_id, info.session_id).await;
    reason
}

struct SessionContext<'a> {
    info: &'a ConnectionInfo,
    closer: &'a CloseSignal,
    hub: &'a ConnectionHub,
}

impl SessionContext<'_> {
    async fn terminate(&self, reason: DisconnectReason) -> bool {
        terminate(self.info, self.closer, self.hub, reason).await
    }
}

async fn handle_text(engine: &ChatEngine, info: &ConnectionInfo, text: &str) -> ServerEvent {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(err) => return ServerEvent::error("invalid_frame", err.to_string()),
    };

    match event {
        ClientEvent::Ping => ServerEvent::Pong,
        ClientEvent::SendMessage {
            client_ref,
            text,
            reply_to,
            attachments,
        } => {
            let draft = MessageDraft {
                text,
                reply_to,
                attachments,
            };
            match engine.submit(info.chat_id, info.user_id, draft).await {
                Ok(message) => ServerEvent::Ack {
                    client_ref,
                    message_id: message.id,
                },
                Err(err) => ServerEvent::error(err.code(), err.to_string()),
            }
        }
    }
}
