//! Repository for member data access operations.

use crate::entities::{ChatMember, MemberRole};
use crate::types::DatabaseResult;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

/// Repository for member database operations
#[derive(Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a user to a chat. Adding an existing member is a no-op.
    pub async fn add(&self, chat_id: i64, user_id: i64, role: MemberRole) -> DatabaseResult<ChatMember> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO chat_members (chat_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (chat_id, user_id) DO NOTHING",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(chat_id, user_id, role = role.as_str(), "added chat member");

        Ok(ChatMember {
            chat_id,
            user_id,
            role,
            joined_at: now,
        })
    }

    pub async fn is_member(&self, chat_id: i64, user_id: i64) -> DatabaseResult<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM chat_members WHERE chat_id = ? AND user_id = ?")
                .bind(chat_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    pub async fn list_user_ids(&self, chat_id: i64) -> DatabaseResult<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM chat_members WHERE chat_id = ? ORDER BY user_id")
                .bind(chat_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
