//! Sendiz Database Crate
//!
//! Connection management, migrations, repositories and the [`ChatStore`]
//! seam used by the chat delivery services.

use sendiz_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod store;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

pub use entities::{
    Attachment, AttachmentKind, Chat, ChatMember, MemberRole, Message, NewAttachment, NewMessage,
};
pub use repos::{AttachmentRepository, ChatRepository, MemberRepository, MessageRepository};
pub use store::{ChatStore, SqliteStore};
pub use types::{DatabaseError, DatabaseResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}
