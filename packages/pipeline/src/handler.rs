//! The transcription job: fetch the upload, recognize it in a scratch
//! directory and record the outcome in the result store.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actors::{HandlerFuture, HandlerResult, JobHandler};
use db::ResultStore;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use storage::Storage;
use transcriber_core::{Job, JobId, JobResult};

use crate::PipelineError;
use crate::recognizer::RecognitionPipeline;

/// Job type routed to [`TranscriptionHandler`].
pub const TRANSCRIBE_JOB_TYPE: &str = "transcribe";

/// Payload of a transcription job: where its upload lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionPayload {
    pub upload_key: String,
    pub extension: String,
}

impl TranscriptionPayload {
    pub fn new(upload_key: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            upload_key: upload_key.into(),
            extension: extension.into(),
        }
    }

    /// Build the job that transcribes this upload under `id`.
    pub fn into_job(self, id: JobId) -> Result<Job, PipelineError> {
        Ok(Job::with_id(id, TRANSCRIBE_JOB_TYPE, serde_json::to_value(self)?))
    }

    pub fn from_job(job: &Job) -> Result<Self, PipelineError> {
        Ok(serde_json::from_value(job.payload.clone())?)
    }
}

/// Runs transcription jobs.
///
/// Every path through a job ends with a terminal status in the result
/// store, the scratch directory removed and the upload deleted.
#[derive(Clone)]
pub struct TranscriptionHandler {
    store: ResultStore,
    storage: Storage,
    pipeline: Arc<dyn RecognitionPipeline>,
    work_root: PathBuf,
    timeout: Option<Duration>,
}

impl TranscriptionHandler {
    pub fn new(
        store: ResultStore,
        storage: Storage,
        pipeline: Arc<dyn RecognitionPipeline>,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            storage,
            pipeline,
            work_root: work_root.into(),
            timeout: None,
        }
    }

    /// Abandon recognition that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run(&self, job: Job) -> HandlerResult {
        let id = job.id;

        let recognized = match TranscriptionPayload::from_job(&job) {
            Ok(payload) => {
                // A panic anywhere in the attempt still ends in a terminal status.
                let recognized = AssertUnwindSafe(self.transcribe(id, &payload))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(PipelineError::Panicked(panic_message(panic.as_ref()))));
                if let Err(e) = self.storage.delete(&payload.upload_key).await {
                    tracing::warn!("Failed to delete upload {}: {}", payload.upload_key, e);
                }
                recognized
            }
            Err(e) => Err(e),
        };

        match recognized {
            Ok(text) => match self.store.complete(id, text.as_str()).await {
                Ok(()) => Ok(JobResult::with_output(
                    format!("transcribed {} characters", text.chars().count()),
                    serde_json::json!({ "id": id.to_string(), "text": text }),
                )),
                Err(e) => {
                    let reason = format!("failed to record transcription {}: {}", id, e);
                    self.record_failure(id, &reason).await;
                    Err(reason)
                }
            },
            Err(e) => {
                let reason = e.to_string();
                self.record_failure(id, &reason).await;
                Err(reason)
            }
        }
    }

    async fn record_failure(&self, id: JobId, reason: &str) {
        tracing::warn!("Transcription {} failed: {}", id, reason);
        if let Err(e) = self.store.fail(id, reason).await {
            tracing::warn!("Failed to record failure of {}: {}", id, e);
        }
    }

    async fn transcribe(&self, id: JobId, payload: &TranscriptionPayload) -> Result<String, PipelineError> {
        tokio::fs::create_dir_all(&self.work_root).await?;
        let workdir = tempfile::Builder::new()
            .prefix(&format!("{}-", id))
            .tempdir_in(&self.work_root)?;

        let audio = workdir.path().join(format!("{}.{}", id, payload.extension));
        let bytes = self.storage.get_bytes(&payload.upload_key).await?;
        tokio::fs::write(&audio, &bytes).await?;

        tracing::debug!(
            "Recognizing {} ({} bytes) with {}",
            id,
            bytes.len(),
            self.pipeline.name()
        );

        let recognition =
            AssertUnwindSafe(async { self.pipeline.recognize(workdir.path(), &audio).await }).catch_unwind();
        let recognized = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, recognition)
                .await
                .map_err(|_| PipelineError::Timeout(limit))?,
            None => recognition.await,
        };
        let text = recognized.map_err(|panic| PipelineError::Panicked(panic_message(panic.as_ref())))??;

        if let Err(e) = workdir.close() {
            tracing::warn!("Failed to remove work directory for {}: {}", id, e);
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyTranscript);
        }
        Ok(text.to_string())
    }
}

impl JobHandler for TranscriptionHandler {
    fn job_type(&self) -> &str {
        TRANSCRIBE_JOB_TYPE
    }

    fn handle(&self, job: &Job) -> HandlerFuture {
        let handler = self.clone();
        let job = job.clone();
        Box::pin(async move { handler.run(job).await })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
