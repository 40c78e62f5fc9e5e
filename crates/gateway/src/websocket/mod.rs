//! WebSocket endpoints for the gateway

pub mod chat;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::state::GatewayState;

pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/chats/:chat_id/ws", get(chat::chat_websocket_handler))
}

pub use chat::{WebSocketSink, WebSocketSource};
