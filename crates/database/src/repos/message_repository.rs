//! Repository for message data access operations.

use crate::connection::ImmediateTransaction;
use crate::entities::{Attachment, Message, NewMessage};
use crate::repos::attachment_repository::attachments_in;
use crate::types::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

const MESSAGE_COLUMNS: &str = "id, chat_id, author_id, text, created_at, edited, reply_to";

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a message and its attachments as one transaction.
    ///
    /// Either the message row and every attachment row become visible
    /// together, or none of them do. The returned message carries its
    /// attachments in submitted order.
    pub async fn create_with_attachments(&self, new: &NewMessage) -> DatabaseResult<Message> {
        let mut tx = ImmediateTransaction::begin(&self.pool).await?;

        let message = match insert_rows(tx.connection()?, new).await {
            Ok(message) => message,
            Err(err) => {
                tx.rollback().await;
                return Err(err);
            }
        };
        tx.commit().await?;

        info!(
            message_id = message.id,
            chat_id = new.chat_id,
            author_id = new.author_id,
            attachments = message.attachments.len(),
            "created new message"
        );
        Ok(message)
    }

    /// Ids of up to `limit` messages in a chat, newest first.
    ///
    /// `before` restricts the page to ids strictly lower than the cursor.
    pub async fn find_page_ids(
        &self,
        chat_id: i64,
        before: Option<i64>,
        limit: u32,
    ) -> DatabaseResult<Vec<i64>> {
        let rows: Vec<(i64,)> = match before {
            Some(cursor) => {
                sqlx::query_as(
                    "SELECT id FROM messages WHERE chat_id = ? AND id < ? ORDER BY id DESC LIMIT ?",
                )
                .bind(chat_id)
                .bind(cursor)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT id FROM messages WHERE chat_id = ? ORDER BY id DESC LIMIT ?")
                    .bind(chat_id)
                    .bind(i64::from(limit))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        debug!(chat_id, ?before, limit, found = rows.len(), "listed message ids");
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Load a single message row, without attachments.
    pub async fn find_in_chat(&self, chat_id: i64, message_id: i64) -> DatabaseResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ? AND chat_id = ?"
        ))
        .bind(message_id)
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    /// Load a message together with its attachments from one snapshot.
    ///
    /// `None` when the message is gone; a message is never returned with
    /// only part of its attachments.
    pub async fn find_with_attachments(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> DatabaseResult<Option<Message>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ? AND chat_id = ?"
        ))
        .bind(message_id)
        .bind(chat_id)
        .fetch_optional(&mut *tx)
        .await?;

        let message = match row {
            Some(row) => {
                let mut message = message_from_row(&row)?;
                message.attachments = attachments_in(&mut *tx, message_id).await?;
                Some(message)
            }
            None => None,
        };

        tx.commit().await?;
        Ok(message)
    }

    /// Replace a message's text and flag it as edited.
    pub async fn update_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> DatabaseResult<Option<Message>> {
        let result = sqlx::query("UPDATE messages SET text = ?, edited = 1 WHERE id = ? AND chat_id = ?")
            .bind(text)
            .bind(message_id)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        info!(message_id, chat_id, "updated message text");
        self.find_in_chat(chat_id, message_id).await
    }

    /// Remove a message; attachments go with it.
    pub async fn delete(&self, chat_id: i64, message_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ? AND chat_id = ?")
            .bind(message_id)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(message_id, chat_id, "deleted message");
        }
        Ok(deleted)
    }

    pub async fn count_for_chat(&self, chat_id: i64) -> DatabaseResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn insert_rows(conn: &mut SqliteConnection, new: &NewMessage) -> DatabaseResult<Message> {
    if let Some(reply_to) = new.reply_to {
        let target: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM messages WHERE id = ? AND chat_id = ?")
                .bind(reply_to)
                .bind(new.chat_id)
                .fetch_optional(&mut *conn)
                .await?;
        if target.is_none() {
            return Err(DatabaseError::Constraint(format!(
                "reply target {} does not exist in chat {}",
                reply_to, new.chat_id
            )));
        }
    }

    // Never hand out a timestamp older than the newest one in the chat.
    let latest: Option<(DateTime<Utc>,)> = sqlx::query_as(
        "SELECT created_at FROM messages WHERE chat_id = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(new.chat_id)
    .fetch_optional(&mut *conn)
    .await?;
    let now = Utc::now();
    let created_at = match latest {
        Some((previous,)) if previous > now => previous,
        _ => now,
    };

    let message_id = sqlx::query(
        "INSERT INTO messages (chat_id, author_id, text, created_at, edited, reply_to)
         VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(new.chat_id)
    .bind(new.author_id)
    .bind(&new.text)
    .bind(created_at)
    .bind(new.reply_to)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let mut attachments = Vec::with_capacity(new.attachments.len());
    for (position, attachment) in new.attachments.iter().enumerate() {
        let position = position as i64;
        let attachment_id = sqlx::query(
            "INSERT INTO attachments (message_id, position, kind, link) VALUES (?, ?, ?, ?)",
        )
        .bind(message_id)
        .bind(position)
        .bind(attachment.kind.as_str())
        .bind(&attachment.link)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        attachments.push(Attachment {
            id: attachment_id,
            message_id,
            position,
            kind: attachment.kind,
            link: attachment.link.clone(),
        });
    }

    Ok(Message {
        id: message_id,
        chat_id: new.chat_id,
        author_id: new.author_id,
        text: new.text.clone(),
        created_at,
        edited: false,
        reply_to: new.reply_to,
        attachments,
    })
}

fn message_from_row(row: &SqliteRow) -> DatabaseResult<Message> {
    let edited: i64 = row.try_get("edited")?;
    Ok(Message {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        author_id: row.try_get("author_id")?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
        edited: edited != 0,
        reply_to: row.try_get("reply_to")?,
        attachments: Vec::new(),
    })
}
