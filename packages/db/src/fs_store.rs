//! File-based result store compatible with existing `.res` pollers.
//!
//! Layout under the root directory:
//! - `<id>.pending` exists while a registered job is running
//! - `<id>.res` holds the transcription text, or [`FAILURE_MARKER`]
//!
//! Pollers that only know about `.res` files keep working unchanged.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use transcriber_core::{JobId, JobStatus};
use ulid::Ulid;

use crate::DbError;

/// Content of a `.res` file for a failed job.
pub const FAILURE_MARKER: &str = "xxxFAILxxx";

/// Result store backed by one file per job.
#[derive(Debug, Clone)]
pub struct FsResultStore {
    root: PathBuf,
}

impl FsResultStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Ensure the root directory exists.
    pub async fn init(&self) -> Result<(), DbError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn result_path(&self, id: JobId) -> PathBuf {
        self.root.join(format!("{}.res", id))
    }

    fn pending_path(&self, id: JobId) -> PathBuf {
        self.root.join(format!("{}.pending", id))
    }

    /// Mark a job as submitted.
    pub async fn register(&self, id: JobId) -> Result<(), DbError> {
        if fs::try_exists(self.result_path(id)).await? {
            return Err(DbError::AlreadyRegistered(id.to_string()));
        }

        let created = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.pending_path(id))
            .await;

        match created {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(DbError::AlreadyRegistered(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the terminal status for a job.
    ///
    /// The file is written under a unique temporary name and then linked
    /// into place, so a poller never reads a partially written result and
    /// an existing result is never replaced, even by a concurrent writer.
    pub async fn finish(&self, id: JobId, status: &JobStatus) -> Result<(), DbError> {
        let content = match status {
            JobStatus::Completed { text } if text == FAILURE_MARKER => {
                return Err(DbError::Query(format!(
                    "Transcription of {} is indistinguishable from a failure",
                    id
                )));
            }
            JobStatus::Completed { text } => text.as_str(),
            JobStatus::Error => FAILURE_MARKER,
            JobStatus::InProgress => {
                return Err(DbError::Query(format!(
                    "Job {} can only move to a terminal status",
                    id
                )));
            }
        };

        let path = self.result_path(id);
        if fs::try_exists(&path).await? {
            return Err(DbError::AlreadyTerminal(id.to_string()));
        }

        let temp_path = self.root.join(format!("{}.{}.tmp", id, Ulid::new()));
        let linked = match write_synced(&temp_path, content.as_bytes()).await {
            Ok(()) => fs::hard_link(&temp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = fs::remove_file(&temp_path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!("Failed to remove {:?}: {}", temp_path, e);
        }
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(DbError::AlreadyTerminal(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        match fs::remove_file(self.pending_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove pending marker for {}: {}", id, e),
        }

        tracing::debug!("Wrote result to {:?}", path);
        Ok(())
    }

    /// Read the status of a job. `None` means the id was never registered.
    pub async fn status(&self, id: JobId) -> Result<Option<JobStatus>, DbError> {
        match fs::read(self.result_path(id)).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                if text == FAILURE_MARKER {
                    Ok(Some(JobStatus::Error))
                } else {
                    Ok(Some(JobStatus::Completed { text }))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if fs::try_exists(self.pending_path(id)).await? {
                    Ok(Some(JobStatus::InProgress))
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
