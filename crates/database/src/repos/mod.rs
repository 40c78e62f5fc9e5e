//! Database repository implementations

pub mod attachment_repository;
pub mod chat_repository;
pub mod member_repository;
pub mod message_repository;

pub use attachment_repository::AttachmentRepository;
pub use chat_repository::ChatRepository;
pub use member_repository::MemberRepository;
pub use message_repository::MessageRepository;
