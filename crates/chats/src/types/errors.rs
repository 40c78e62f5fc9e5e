//! Error types for the chat delivery layer.

use sendiz_database::DatabaseError;
use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Validation error: {message}")]
    ValidationFailed { message: String },

    /// The store rejected the write, e.g. a reply target that does not exist.
    #[error("Constraint violated: {message}")]
    ConstraintViolated { message: String },

    /// Transient; the caller may retry.
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Failed to hydrate message {message_id}: {reason}")]
    HydrationFailed { message_id: i64, reason: String },

    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Message not found: {id}")]
    MessageNotFound { id: i64 },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    pub fn hydration(message_id: i64, reason: impl Into<String>) -> Self {
        Self::HydrationFailed {
            message_id,
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed { .. } => "validation_failed",
            Self::ConstraintViolated { .. } => "constraint_violated",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::HydrationFailed { .. } => "hydration_failed",
            Self::AccessDenied { .. } => "access_denied",
            Self::MessageNotFound { .. } => "message_not_found",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<DatabaseError> for ChatError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Constraint(message) => Self::ConstraintViolated { message },
            DatabaseError::Unavailable(message) | DatabaseError::ConnectionError(message) => {
                Self::StoreUnavailable { message }
            }
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON serialization error: {}", err),
        }
    }
}
