//! Database connection management

use anyhow::{Context, Result};
use sendiz_config::DatabaseConfig;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

use crate::types::{DatabaseError, DatabaseResult};

/// Prepare and establish a database connection.
///
/// Pragmas are set through the connect options so that every pooled
/// connection enforces foreign keys and waits on locks.
pub async fn prepare_database(config: &DatabaseConfig) -> Result<SqlitePool> {
    ensure_sqlite_path(&config.url).await?;

    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("invalid database url {}", config.url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to database {}", config.url))?;

    info!(url = %config.url, "database connection established");
    Ok(pool)
}

/// Ensure the directory holding the SQLite database file exists.
async fn ensure_sqlite_path(url: &str) -> Result<()> {
    let Some(sqlite_path) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };

    let sqlite_path = sqlite_path.split('?').next().unwrap_or_default();
    if sqlite_path.is_empty() || sqlite_path == ":memory:" {
        return Ok(());
    }

    let path = Path::new(sqlite_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create sqlite directory {}", parent.display())
            })?;
        }
    }

    Ok(())
}

/// Write transaction that holds SQLite's write lock from `BEGIN`.
///
/// Concurrent writers queue on `busy_timeout` at `BEGIN IMMEDIATE` instead of
/// failing when a read inside the transaction is later upgraded to a write.
/// Dropping it without [`commit`](Self::commit) or [`rollback`](Self::rollback)
/// closes the connection, which discards the open transaction.
pub(crate) struct ImmediateTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl ImmediateTransaction {
    pub(crate) async fn begin(pool: &SqlitePool) -> DatabaseResult<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    pub(crate) fn connection(&mut self) -> DatabaseResult<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| DatabaseError::QueryError("transaction already finished".to_string()))
    }

    pub(crate) async fn commit(mut self) -> DatabaseResult<()> {
        sqlx::query("COMMIT").execute(self.connection()?).await?;
        self.conn.take();
        Ok(())
    }

    pub(crate) async fn rollback(mut self) {
        let Ok(conn) = self.connection() else {
            return;
        };
        match sqlx::query("ROLLBACK").execute(conn).await {
            Ok(_) => {
                self.conn.take();
            }
            Err(err) => warn!(error = %err, "rollback failed, discarding connection"),
        }
    }
}

impl Drop for ImmediateTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}
