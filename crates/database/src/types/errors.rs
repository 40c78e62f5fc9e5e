//! Error types for the database layer

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Storage error, classified by how a caller is expected to react to it.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// Transient: the store could not be reached or was too busy to answer.
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    /// A referential or check constraint rejected the write.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database query error: {0}")]
    QueryError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),
}

impl DatabaseError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::ConnectionError(_))
    }
}

// SQLITE_BUSY, SQLITE_LOCKED and their extended codes.
const BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517"];

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => Self::Unavailable(error.to_string()),
            sqlx::Error::RowNotFound => Self::NotFound(error.to_string()),
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => Self::Constraint(db.message().to_string()),
                _ => {
                    let busy = db
                        .code()
                        .map(|code| BUSY_CODES.iter().any(|busy| code == *busy))
                        .unwrap_or(false);
                    if busy {
                        Self::Unavailable(db.message().to_string())
                    } else {
                        Self::QueryError(db.message().to_string())
                    }
                }
            },
            _ => Self::QueryError(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        Self::MigrationError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_unavailable() {
        let error = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(error.is_unavailable());

        let error = DatabaseError::from(sqlx::Error::PoolClosed);
        assert!(error.is_unavailable());
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let error = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(matches!(error, DatabaseError::NotFound(_)));
        assert!(!error.is_unavailable());
    }
}
