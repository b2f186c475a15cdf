//! Result store for transcription jobs.
//!
//! Job statuses live either in SurrealDB or, for compatibility with
//! existing pollers, in one `.res` file per job.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod error;
mod fs_store;
mod schema;
mod store;
pub mod repositories;

pub use connection::{Database, DbConfig, get_db, init_db};
pub use error::DbError;
pub use fs_store::{FAILURE_MARKER, FsResultStore};
pub use schema::init_schema;
pub use store::{ResultStore, ResultStoreConfig};

/// Initialize the database with the given configuration.
///
/// This should be called once at application startup.
pub async fn init(config: DbConfig) -> Result<(), DbError> {
    init_db(config).await?;
    init_schema().await?;
    Ok(())
}
