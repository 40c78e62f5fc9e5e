//! Repository for chat data access operations.

use crate::entities::Chat;
use crate::types::DatabaseResult;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::info;

#[derive(Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new group chat
    pub async fn create(&self, name: &str) -> DatabaseResult<Chat> {
        let now = Utc::now();
        let id = sqlx::query("INSERT INTO chats (name, chat_type, created_at) VALUES (?, 'group', ?)")
            .bind(name)
            .bind(now)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        info!(chat_id = id, name, "created new chat");

        Ok(Chat {
            id,
            name: name.to_string(),
            chat_type: "group".to_string(),
            created_at: now,
        })
    }

    pub async fn find_by_id(&self, chat_id: i64) -> DatabaseResult<Option<Chat>> {
        let row = sqlx::query("SELECT id, name, chat_type, created_at FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Chat {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                chat_type: row.try_get("chat_type")?,
                created_at: row.try_get("created_at")?,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;

    #[tokio::test]
    async fn create_then_find() {
        let (pool, _dir) = test_pool().await;
        let repo = ChatRepository::new(pool);

        let chat = repo.create("general").await.unwrap();
        let found = repo.find_by_id(chat.id).await.unwrap().unwrap();
        assert_eq!(found.name, "general");
        assert_eq!(found.chat_type, "group");
        assert!(repo.find_by_id(chat.id + 1).await.unwrap().is_none());
    }
}
