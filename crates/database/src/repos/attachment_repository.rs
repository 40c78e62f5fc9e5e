//! Repository for attachment data access operations.

use crate::entities::{Attachment, AttachmentKind};
use crate::types::{DatabaseError, DatabaseResult};
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Repository for attachment database operations
#[derive(Clone)]
pub struct AttachmentRepository {
    pool: SqlitePool,
}

impl AttachmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find all attachments for a message, in submitted order
    pub async fn find_by_message_id(&self, message_id: i64) -> DatabaseResult<Vec<Attachment>> {
        let mut conn = self.pool.acquire().await?;
        attachments_in(&mut *conn, message_id).await
    }
}

/// Attachments of `message_id` read on `conn`, so callers can share a transaction.
pub(crate) async fn attachments_in(
    conn: &mut SqliteConnection,
    message_id: i64,
) -> DatabaseResult<Vec<Attachment>> {
    let rows = sqlx::query(
        "SELECT id, message_id, position, kind, link
         FROM attachments WHERE message_id = ? ORDER BY position ASC",
    )
    .bind(message_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| -> DatabaseResult<Attachment> {
            let kind: String = row.try_get("kind")?;
            let kind = kind
                .parse::<AttachmentKind>()
                .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

            Ok(Attachment {
                id: row.try_get("id")?,
                message_id: row.try_get("message_id")?,
                position: row.try_get("position")?,
                kind,
                link: row.try_get("link")?,
            })
        })
        .collect()
}
