//! # Sendiz Chats Crate
//!
//! Core delivery logic for Sendiz chats: validated atomic persistence of
//! messages with their attachments, paginated history with bounded
//! concurrent hydration, and real-time fan-out to live sessions.
//!
//! ## Architecture
//!
//! - **Services**: `PersistenceGateway` (writes) and `HistoryReader` (reads)
//! - **Hub**: `ConnectionHub` registry plus per-session queues and close signals
//! - **Session**: reader/writer loops over a transport-agnostic frame interface
//! - **Engine**: `ChatEngine`, the boundary used by transports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sendiz_chats::{ChatEngine, ConnectionHub, MessageDraft};
//!
//! let engine = ChatEngine::new(store, ConnectionHub::new(), config.delivery.clone());
//! let message = engine.submit(chat_id, user_id, MessageDraft::text("hi")).await?;
//! ```

pub mod engine;
pub mod hub;
pub mod services;
pub mod session;
pub mod types;

pub use engine::ChatEngine;
pub use hub::{
    BroadcastReport, CloseSignal, Connection, ConnectionHandle, ConnectionHub, ConnectionInfo,
    DisconnectReason, Payload, SessionId,
};
pub use services::{HistoryReader, MessageDraft, MessagePage, PageCursor, PersistenceGateway};
pub use session::{run_session, FrameSink, FrameSource, InboundFrame, TransportError};
pub use types::{ChatError, ChatResult, ClientEvent, ServerEvent};
