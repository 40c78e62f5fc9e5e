//! Storage-facing services.

pub mod history;
pub mod persistence;

pub use history::{HistoryReader, MessagePage, PageCursor};
pub use persistence::{MessageDraft, PersistenceGateway};
