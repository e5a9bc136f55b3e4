//! SQLite storage for the GTD tracker.
//!
//! This crate owns the on-disk shape of projects, steps and the category/status
//! registries: connection management, ordered schema migrations and the typed
//! record stores used by `gtd-core`.

pub mod connection;
pub mod migrations;
pub mod models;
pub mod schema;

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for database operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {message}")]
    Migration { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Concurrent timer update on step {id}")]
    Conflict { id: i64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic database error: {0}")]
    Generic(String),
}

impl Error {
    /// Create a new migration error.
    pub fn migration<S: Into<String>>(message: S) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    /// Create a new not-found error for the given entity kind.
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Create a new generic database error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}

/// Database connection and management.
pub use connection::Database;

/// Migration policy and bookkeeping.
pub use migrations::{MigrationManager, MigrationOutcome, MigrationPolicy};

/// Database models and operations.
pub use models::{
    ProjectFilter, ProjectId, ProjectRecord, ProjectStore, QueryVariant, RegistryStore, StepId,
    StepRecord, StepStore,
};

/// Schema definitions and constants.
pub use schema::*;

/// Connection type handed to store closures.
pub use rusqlite::Connection;
