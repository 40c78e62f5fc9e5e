//! Domain entities for the database layer

pub mod attachment;
pub mod chat;
pub mod message;

pub use attachment::{Attachment, AttachmentKind, NewAttachment, UnknownAttachmentKind};
pub use chat::{Chat, ChatMember, MemberRole};
pub use message::{Message, NewMessage};
