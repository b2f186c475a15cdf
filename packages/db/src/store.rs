//! Result store facade over the database and filesystem backends.

use std::path::PathBuf;

use transcriber_core::{JobId, JobStatus};

use crate::fs_store::FsResultStore;
use crate::repositories::TranscriptionRepository;
use crate::{DbConfig, DbError};

/// Which backend keeps job statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultStoreConfig {
    /// SurrealDB records, one per job.
    Database(DbConfig),
    /// Legacy `.res` files under a directory.
    Filesystem { root: PathBuf },
}

impl Default for ResultStoreConfig {
    fn default() -> Self {
        Self::Database(DbConfig::default())
    }
}

/// Keyed store of job statuses.
///
/// Each key is written by exactly one worker and read by any number of
/// pollers. Entries go from in-progress to terminal exactly once.
#[derive(Debug, Clone)]
pub enum ResultStore {
    Database,
    Filesystem(FsResultStore),
}

impl ResultStore {
    /// Open the configured backend, initializing it if needed.
    pub async fn open(config: ResultStoreConfig) -> Result<Self, DbError> {
        match config {
            ResultStoreConfig::Database(db_config) => {
                crate::init(db_config).await?;
                Ok(Self::Database)
            }
            ResultStoreConfig::Filesystem { root } => {
                let store = FsResultStore::new(root);
                store.init().await?;
                Ok(Self::Filesystem(store))
            }
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            ResultStore::Database => "database",
            ResultStore::Filesystem(_) => "filesystem",
        }
    }

    /// Record a submitted job as in progress.
    pub async fn register(&self, id: JobId) -> Result<(), DbError> {
        match self {
            ResultStore::Database => TranscriptionRepository::register(id).await.map(|_| ()),
            ResultStore::Filesystem(fs) => fs.register(id).await,
        }
    }

    /// Record a successful transcription.
    pub async fn complete(&self, id: JobId, text: impl Into<String>) -> Result<(), DbError> {
        let status = JobStatus::Completed { text: text.into() };
        match self {
            ResultStore::Database => TranscriptionRepository::finish(id, status, None)
                .await
                .map(|_| ()),
            ResultStore::Filesystem(fs) => fs.finish(id, &status).await,
        }
    }

    /// Record a failed transcription. The detail is kept for operators only.
    pub async fn fail(&self, id: JobId, detail: impl Into<String>) -> Result<(), DbError> {
        let detail = detail.into();
        match self {
            ResultStore::Database => {
                TranscriptionRepository::finish(id, JobStatus::Error, Some(detail))
                    .await
                    .map(|_| ())
            }
            ResultStore::Filesystem(fs) => {
                tracing::debug!("Job {} failed: {}", id, detail);
                fs.finish(id, &JobStatus::Error).await
            }
        }
    }

    /// Look up a job's status. `None` means the id was never submitted.
    pub async fn status(&self, id: JobId) -> Result<Option<JobStatus>, DbError> {
        match self {
            ResultStore::Database => Ok(TranscriptionRepository::get(id)
                .await?
                .map(|entry| entry.status)),
            ResultStore::Filesystem(fs) => fs.status(id).await,
        }
    }
}
