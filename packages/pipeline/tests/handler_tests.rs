#![allow(clippy::disallowed_methods)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{JobHandler, JobHandlerRegistry, WorkerPool};
use bytes::Bytes;
use db::{FAILURE_MARKER, ResultStore, ResultStoreConfig};
use pipeline::{
    PipelineError, PipelineFuture, RecognitionPipeline, TranscriptionHandler, TranscriptionPayload,
};
use storage::{Storage, StorageConfig, upload_key};
use tempfile::TempDir;
use transcriber_core::{JobId, JobStatus, PoolConfig};

enum Behavior {
    /// Echo the audio file's content.
    Echo,
    Fail,
    Panic,
    /// Panic before a future is even returned.
    PanicEagerly,
    Hang,
}

struct FakePipeline {
    behavior: Behavior,
    workdirs: Mutex<Vec<PathBuf>>,
}

impl FakePipeline {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            workdirs: Mutex::new(Vec::new()),
        })
    }

    fn workdirs(&self) -> Vec<PathBuf> {
        self.workdirs.lock().unwrap().clone()
    }
}

impl RecognitionPipeline for FakePipeline {
    fn name(&self) -> &str {
        "fake"
    }

    fn recognize<'a>(&'a self, workdir: &'a Path, audio: &'a Path) -> PipelineFuture<'a> {
        if let Behavior::PanicEagerly = self.behavior {
            panic!("model failed to load");
        }
        Box::pin(async move {
            self.workdirs.lock().unwrap().push(workdir.to_path_buf());
            assert!(audio.starts_with(workdir));
            match self.behavior {
                Behavior::Echo => Ok(tokio::fs::read_to_string(audio).await?),
                Behavior::Fail => Err(PipelineError::Recognizer {
                    exit_code: Some(1),
                    stderr: "decoder crashed".into(),
                }),
                Behavior::Panic | Behavior::PanicEagerly => panic!("segmenter blew up"),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("too late".into())
                }
            }
        })
    }
}

struct Fixture {
    _dir: TempDir,
    work_root: PathBuf,
    store: ResultStore,
    storage: Storage,
}

impl Fixture {
    async fn new() -> Result<Self, Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = ResultStore::open(ResultStoreConfig::Filesystem {
            root: dir.path().join("archive"),
        })
        .await?;
        Ok(Self {
            work_root: dir.path().join("work"),
            store,
            storage: Storage::new(StorageConfig::memory())?,
            _dir: dir,
        })
    }

    fn handler(&self, pipeline: Arc<FakePipeline>) -> TranscriptionHandler {
        TranscriptionHandler::new(
            self.store.clone(),
            self.storage.clone(),
            pipeline,
            &self.work_root,
        )
    }

    /// Register a job and store its upload, the way admission does.
    async fn upload(&self, audio: &str) -> Result<(JobId, TranscriptionPayload), Box<dyn Error>> {
        let id = JobId::new();
        let key = upload_key(id, "ogg");
        self.store.register(id).await?;
        self.storage
            .put_bytes(&key, Bytes::from(audio.to_string()))
            .await?;
        Ok((id, TranscriptionPayload::new(key, "ogg")))
    }

    fn work_root_is_empty(&self) -> bool {
        std::fs::read_dir(&self.work_root)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

#[tokio::test]
async fn test_successful_transcription_is_recorded() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new().await?;
    let pipeline = FakePipeline::new(Behavior::Echo);
    let handler = fx.handler(pipeline.clone());

    let (id, payload) = fx.upload(" добрый день \n").await?;
    let key = payload.upload_key.clone();
    let result = handler.handle(&payload.into_job(id)?).await?;

    assert_eq!(result.output.as_ref().and_then(|o| o["text"].as_str()), Some("добрый день"));
    assert_eq!(
        fx.store.status(id).await?,
        Some(JobStatus::Completed {
            text: "добрый день".into()
        })
    );
    assert!(!fx.storage.exists(&key).await?);
    assert_eq!(pipeline.workdirs().len(), 1);
    assert!(pipeline.workdirs().iter().all(|dir| !dir.exists()));
    assert!(fx.work_root_is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failing_pipeline_records_error_and_cleans_up() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new().await?;
    let pipeline = FakePipeline::new(Behavior::Fail);
    let handler = fx.handler(pipeline.clone());

    let (id, payload) = fx.upload("noise").await?;
    let key = payload.upload_key.clone();
    let err = handler.handle(&payload.into_job(id)?).await.unwrap_err();

    assert!(err.contains("decoder crashed"));
    assert_eq!(fx.store.status(id).await?, Some(JobStatus::Error));
    assert!(!fx.storage.exists(&key).await?);
    assert!(pipeline.workdirs().iter().all(|dir| !dir.exists()));
    assert!(fx.work_root_is_empty());
    Ok(())
}

#[tokio::test]
async fn test_empty_transcript_is_an_error() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new().await?;
    let handler = fx.handler(FakePipeline::new(Behavior::Echo));

    let (id, payload) = fx.upload("   \n").await?;
    let err = handler.handle(&payload.into_job(id)?).await.unwrap_err();

    assert_eq!(err, PipelineError::EmptyTranscript.to_string());
    assert_eq!(fx.store.status(id).await?, Some(JobStatus::Error));
    assert!(fx.work_root_is_empty());
    Ok(())
}

#[tokio::test]
async fn test_panicking_pipeline_records_error() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new().await?;
    let pipeline = FakePipeline::new(Behavior::Panic);
    let handler = fx.handler(pipeline.clone());

    let (id, payload) = fx.upload("noise").await?;
    let err = handler.handle(&payload.into_job(id)?).await.unwrap_err();

    assert!(err.contains("segmenter blew up"));
    assert_eq!(fx.store.status(id).await?, Some(JobStatus::Error));
    assert!(pipeline.workdirs().iter().all(|dir| !dir.exists()));
    Ok(())
}

#[tokio::test]
async fn test_pipeline_panicking_before_it_starts_records_error() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new().await?;
    let mut handlers = JobHandlerRegistry::new();
    handlers.register(fx.handler(FakePipeline::new(Behavior::PanicEagerly)));
    let pool = WorkerPool::start(PoolConfig::default().with_workers(1), handlers).await?;

    let (id, payload) = fx.upload("noise").await?;
    let key = payload.upload_key.clone();
    pool.submit(payload.into_job(id)?).await?;
    pool.drain_and_stop().await?;

    assert_eq!(fx.store.status(id).await?, Some(JobStatus::Error));
    assert!(!fx.storage.exists(&key).await?);
    assert!(fx.work_root_is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unrecordable_transcript_falls_back_to_error() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new().await?;
    let handler = fx.handler(FakePipeline::new(Behavior::Echo));

    // The legacy store cannot tell this transcript apart from a failure.
    let (id, payload) = fx.upload(FAILURE_MARKER).await?;
    let key = payload.upload_key.clone();
    let err = handler.handle(&payload.into_job(id)?).await.unwrap_err();

    assert!(err.contains("failed to record transcription"));
    assert_eq!(fx.store.status(id).await?, Some(JobStatus::Error));
    assert!(!fx.storage.exists(&key).await?);
    Ok(())
}

#[tokio::test]
async fn test_timeout_records_error() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new().await?;
    let handler = fx
        .handler(FakePipeline::new(Behavior::Hang))
        .with_timeout(Duration::from_millis(50));

    let (id, payload) = fx.upload("noise").await?;
    let err = handler.handle(&payload.into_job(id)?).await.unwrap_err();

    assert!(err.contains("timed out"));
    assert_eq!(fx.store.status(id).await?, Some(JobStatus::Error));
    assert!(fx.work_root_is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_upload_records_error() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new().await?;
    let pipeline = FakePipeline::new(Behavior::Echo);
    let handler = fx.handler(pipeline.clone());

    let id = JobId::new();
    fx.store.register(id).await?;
    let job = TranscriptionPayload::new(upload_key(id, "ogg"), "ogg").into_job(id)?;
    handler.handle(&job).await.unwrap_err();

    assert_eq!(fx.store.status(id).await?, Some(JobStatus::Error));
    assert!(pipeline.workdirs().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_pool_runs_transcriptions_to_completion() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new().await?;
    let mut handlers = JobHandlerRegistry::new();
    handlers.register(fx.handler(FakePipeline::new(Behavior::Echo)));
    let pool = WorkerPool::start(PoolConfig::default().with_workers(3), handlers).await?;

    let mut expected = Vec::new();
    for n in 0..10 {
        let text = format!("utterance {n}");
        let (id, payload) = fx.upload(&text).await?;
        pool.submit(payload.into_job(id)?).await?;
        expected.push((id, text));
    }

    pool.drain_and_stop().await?;

    for (id, text) in expected {
        assert_eq!(fx.store.status(id).await?, Some(JobStatus::Completed { text }));
    }
    assert!(fx.work_root_is_empty());
    Ok(())
}
