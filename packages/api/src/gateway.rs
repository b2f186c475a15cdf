//! Admission and status lookup.
//!
//! Neither operation waits on job execution: submission returns as soon as
//! the job is queued and status reads go straight to the result store.

use actors::{PoolError, WorkerPool};
use db::{DbError, ResultStore};
use pipeline::{PipelineError, TranscriptionPayload};
use storage::{Storage, StorageError, upload_key};
use tokio::sync::broadcast;
use transcriber_core::{JobId, PoolEvent, PoolStats, StatusResponse};

use crate::admission::{AdmissionError, AdmissionPolicy, Upload};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("invalid job id: {0}")]
    InvalidId(String),

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("result store error: {0}")]
    Store(#[from] DbError),

    #[error("upload storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to enqueue job: {0}")]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Front door of the transcriber.
pub struct Gateway {
    pool: WorkerPool,
    store: ResultStore,
    storage: Storage,
    policy: AdmissionPolicy,
}

impl Gateway {
    pub fn new(pool: WorkerPool, store: ResultStore, storage: Storage, policy: AdmissionPolicy) -> Self {
        Self {
            pool,
            store,
            storage,
            policy,
        }
    }

    /// Validate an upload, store it and queue its transcription.
    ///
    /// The job is registered as in progress before it is queued, so a
    /// status lookup with the returned id never reports it as unknown.
    pub async fn submit_job(&self, upload: Upload) -> Result<JobId, GatewayError> {
        let extension = self.policy.admit(&upload)?;
        let id = JobId::new();
        let key = upload_key(id, &extension);

        self.store.register(id).await?;

        if let Err(e) = self.storage.put_bytes(&key, upload.bytes).await {
            self.abandon(id, &key, &e).await;
            return Err(e.into());
        }

        let job = match TranscriptionPayload::new(key.clone(), extension).into_job(id) {
            Ok(job) => job,
            Err(e) => {
                self.abandon(id, &key, &e).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.pool.submit(job).await {
            self.abandon(id, &key, &e).await;
            return Err(e.into());
        }

        tracing::info!("Accepted transcription {}", id);
        Ok(id)
    }

    /// Mark a job that never reached the queue as failed and drop its upload.
    async fn abandon(&self, id: JobId, key: &str, reason: &dyn std::fmt::Display) {
        tracing::warn!("Could not queue transcription {}: {}", id, reason);
        if let Err(e) = self.store.fail(id, format!("not queued: {}", reason)).await {
            tracing::warn!("Failed to record failure of {}: {}", id, e);
        }
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!("Failed to delete upload {}: {}", key, e);
        }
    }

    /// Current status of a job.
    pub async fn get_status(&self, id: &str) -> Result<StatusResponse, GatewayError> {
        let job_id = JobId::parse(id).map_err(|_| GatewayError::InvalidId(id.trim().to_string()))?;

        match self.store.status(job_id).await? {
            Some(status) => Ok(StatusResponse::new(job_id, status)),
            None => Err(GatewayError::UnknownJob(job_id.to_string())),
        }
    }

    pub async fn stats(&self) -> Result<PoolStats, GatewayError> {
        Ok(self.pool.stats().await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.pool.subscribe()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Finish every accepted job and stop the pool.
    pub async fn shutdown(self) -> Result<(), GatewayError> {
        tracing::info!("Shutting down transcriber");
        self.pool.drain_and_stop().await?;
        Ok(())
    }
}
