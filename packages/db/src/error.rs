use thiserror::Error;

/// Errors raised by either result store backend.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not initialized - call init_db first")]
    NotInitialized,
    #[error("Connection error: {0}")]
    Connection(#[from] surrealdb::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// A job id was registered twice.
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),
    /// Completed and error statuses are written once.
    #[error("Status already final: {0}")]
    AlreadyTerminal(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
