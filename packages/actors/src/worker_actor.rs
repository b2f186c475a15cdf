//! Worker actor for executing jobs.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use futures_util::FutureExt;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;
use transcriber_core::{CollectedResult, Job, JobOutcome, PoolEvent};

use crate::handler::JobHandlerRegistry;
use crate::messages::{QueueMessage, WorkerMessage};

/// Retained outcomes shared between workers and the pool handle.
pub(crate) type SharedResults = Arc<Mutex<Vec<CollectedResult>>>;

/// State for the worker actor.
pub struct WorkerActorState {
    worker_id: String,
    queue: ActorRef<QueueMessage>,
    handlers: Arc<JobHandlerRegistry>,
    results: SharedResults,
    event_tx: broadcast::Sender<PoolEvent>,
}

impl WorkerActorState {
    fn emit(&self, event: PoolEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Run one job inside a failure boundary.
    ///
    /// Handler errors and panics both become a failed outcome for this job.
    async fn run(&self, job: &Job) -> JobOutcome {
        let Some(handler) = self.handlers.resolve(job) else {
            return JobOutcome::Failed {
                error: format!("No handler for job type: {}", job.job_type),
            };
        };

        let execution = AssertUnwindSafe(async { handler.handle(job).await })
            .catch_unwind()
            .await;

        match execution {
            Ok(Ok(result)) => JobOutcome::Completed { result },
            Ok(Err(error)) => JobOutcome::Failed { error },
            Err(panic) => JobOutcome::Failed {
                error: format!("Handler panicked: {}", panic_message(panic.as_ref())),
            },
        }
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

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: ActorRef<QueueMessage>,
    pub handlers: Arc<JobHandlerRegistry>,
    pub(crate) results: SharedResults,
    pub event_tx: broadcast::Sender<PoolEvent>,
}

/// Worker actor that executes jobs one at a time.
///
/// The worker never polls: it announces itself to the queue actor and then
/// waits on its mailbox for a job or the shutdown sentinel.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            queue: args.queue,
            handlers: args.handlers,
            results: args.results,
            event_tx: args.event_tx,
        })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.queue.send_message(QueueMessage::WorkerReady {
            worker_id: state.worker_id.clone(),
            worker: myself,
        })?;
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::ProcessJob { job } => {
                let job = *job;
                let job_id = job.id;
                let started = Instant::now();

                state.emit(PoolEvent::JobStarted {
                    job_id,
                    worker_id: state.worker_id.clone(),
                    timestamp: Utc::now(),
                });
                tracing::debug!("{} running job {} ({})", state.worker_id, job_id, job.job_type);

                let outcome = state.run(&job).await;
                let duration_ms = started.elapsed().as_millis() as u64;
                let succeeded = outcome.is_success();

                match &outcome {
                    JobOutcome::Completed { .. } => {
                        tracing::info!("Job {} completed in {}ms", job_id, duration_ms);
                        state.emit(PoolEvent::JobCompleted {
                            job_id,
                            worker_id: state.worker_id.clone(),
                            duration_ms,
                            timestamp: Utc::now(),
                        });
                    }
                    JobOutcome::Failed { error } => {
                        tracing::warn!("Job {} failed after {}ms: {}", job_id, duration_ms, error);
                        state.emit(PoolEvent::JobFailed {
                            job_id,
                            worker_id: state.worker_id.clone(),
                            error: error.clone(),
                            timestamp: Utc::now(),
                        });
                    }
                }

                if job.keep_result {
                    // A poisoned lock is a pool invariant violation: fail the
                    // actor so the queue actor escalates.
                    let mut results = state.results.lock().map_err(|_| {
                        ActorProcessingErr::from(format!(
                            "{}: collected results lock poisoned",
                            state.worker_id
                        ))
                    })?;
                    results.push(CollectedResult { job, outcome });
                }

                state.queue.send_message(QueueMessage::JobFinished {
                    worker_id: state.worker_id.clone(),
                    worker: myself,
                    job_id,
                    succeeded,
                })?;
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.emit(PoolEvent::WorkerStopped {
            worker_id: state.worker_id.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
