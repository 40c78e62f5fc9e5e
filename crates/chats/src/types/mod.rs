//! Shared types for the chat delivery layer.

pub mod errors;
pub mod events;

pub use errors::{ChatError, ChatResult};
pub use events::{ClientEvent, ServerEvent};
