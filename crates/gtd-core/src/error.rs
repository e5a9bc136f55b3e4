//! Core error types for the tracker.

/// Core error type for all tracker operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Database error: {0}")]
    Database(gtd_local_db::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    /// Create a new validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new store-unavailable error.
    pub fn store_unavailable<S: Into<String>>(message: S) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create a new generic error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}

impl From<gtd_local_db::Error> for Error {
    fn from(err: gtd_local_db::Error) -> Self {
        match err {
            gtd_local_db::Error::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Database(other),
        }
    }
}
