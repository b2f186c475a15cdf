//! Startup wiring for the transcriber.

use std::sync::Arc;

use actors::{JobHandlerRegistry, PoolError, WorkerPool};
use db::{DbError, ResultStore};
use pipeline::{CommandPipeline, RecognitionPipeline, TranscriptionHandler};
use storage::{Storage, StorageError};

use crate::config::AppConfig;
use crate::gateway::Gateway;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to open result store: {0}")]
    Store(#[from] DbError),

    #[error("failed to open upload storage: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] PoolError),
}

/// Start the transcriber with the recognizer command from `config`.
///
/// This should be called once at startup.
pub async fn init_transcriber(config: AppConfig) -> Result<Gateway, InitError> {
    let mut pipeline = CommandPipeline::new(config.pipeline.command.clone())
        .with_args(config.pipeline.args.iter().cloned());
    if let Some(ffmpeg) = &config.pipeline.ffmpeg {
        pipeline = pipeline.with_ffmpeg(ffmpeg);
    }

    build_gateway(config, Arc::new(pipeline)).await
}

/// Start the transcriber around any recognition pipeline.
pub async fn build_gateway(
    config: AppConfig,
    pipeline: Arc<dyn RecognitionPipeline>,
) -> Result<Gateway, InitError> {
    tracing::info!("Initializing transcriber...");

    let store = ResultStore::open(config.result_store).await?;
    let storage = Storage::new(config.storage)?;

    let mut handler = TranscriptionHandler::new(
        store.clone(),
        storage.clone(),
        pipeline,
        config.pipeline.work_dir,
    );
    if let Some(timeout) = config.pipeline.timeout {
        handler = handler.with_timeout(timeout);
    }

    let mut handlers = JobHandlerRegistry::new();
    handlers.register(handler);

    let workers = config.pool.workers;
    let pool = WorkerPool::start(config.pool, handlers).await?;

    tracing::info!(
        "Transcriber initialized (result store: {}, uploads: {}, workers: {})",
        store.kind_str(),
        storage.kind().as_str(),
        workers
    );
    Ok(Gateway::new(pool, store, storage, config.admission))
}
