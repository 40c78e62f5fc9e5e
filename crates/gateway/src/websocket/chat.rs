//! Chat WebSocket handler

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    Extension,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tracing::{info, warn};

use sendiz_chats::{run_session, FrameSink, FrameSource, InboundFrame, Payload, TransportError};

use crate::error::GatewayResult;
use crate::middleware::UserId;
use crate::state::GatewayState;

/// Upgrade to a live session once membership has been confirmed.
///
/// The session is registered with the hub only after the handshake
/// completes.
pub async fn chat_websocket_handler(
    ws: WebSocketUpgrade,
    Path(chat_id): Path<i64>,
    State(state): State<Arc<GatewayState>>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> GatewayResult<Response> {
    state.engine.authorize(chat_id, user_id).await?;
    let engine = state.engine.clone();

    Ok(ws.on_upgrade(move |socket| async move {
        let connection = match engine.connect(chat_id, user_id).await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(chat_id, user_id, error = %err, "session refused after upgrade");
                let (mut sender, _) = socket.split();
                let _ = sender.close().await;
                return;
            }
        };

        let session_id = connection.session_id();
        let (sender, receiver) = socket.split();
        let reason = run_session(
            engine,
            connection,
            WebSocketSource(receiver),
            WebSocketSink(sender),
        )
        .await;
        info!(%session_id, chat_id, user_id, %reason, "websocket closed");
    }))
}

pub struct WebSocketSource(pub SplitStream<WebSocket>);

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        let message = self.0.next().await?;
        Some(match message {
            Ok(Message::Text(text)) => Ok(InboundFrame::Text(text)),
            Ok(Message::Close(_)) => Ok(InboundFrame::Close),
            Ok(_) => Ok(InboundFrame::Other),
            Err(err) => Err(TransportError(err.to_string())),
        })
    }
}

pub struct WebSocketSink(pub SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, payload: Payload) -> Result<(), TransportError> {
        self.0
            .send(Message::Text(payload.to_string()))
            .await
            .map_err(|err| TransportError(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0
            .close()
            .await
            .map_err(|err| TransportError(err.to_string()))
    }
}
