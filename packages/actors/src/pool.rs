//! Worker pool handle: starts the queue actor and its workers and exposes
//! the pool's public operations.

use std::sync::{Arc, Mutex};

use ractor::concurrency::JoinHandle;
use ractor::{Actor, ActorRef};
use tokio::sync::broadcast;
use transcriber_core::{CollectedResult, Job, JobId, PoolConfig, PoolEvent, PoolId, PoolStats};

use crate::handler::JobHandlerRegistry;
use crate::messages::{PoolError, QueueMessage, WorkerMessage};
use crate::queue_actor::{QueueActor, QueueArgs};
use crate::worker_actor::{SharedResults, WorkerActor, WorkerArgs};

/// A fixed-size pool of workers fed from one FIFO queue.
///
/// Workers live until [`WorkerPool::drain_and_stop`]; dropping the handle
/// without draining leaves them running until the runtime shuts down.
pub struct WorkerPool {
    id: PoolId,
    queue: ActorRef<QueueMessage>,
    queue_handle: JoinHandle<()>,
    workers: Vec<(ActorRef<WorkerMessage>, JoinHandle<()>)>,
    results: SharedResults,
    event_tx: broadcast::Sender<PoolEvent>,
}

impl WorkerPool {
    /// Spawn the queue actor and `config.workers` linked worker actors.
    pub async fn start(config: PoolConfig, handlers: JobHandlerRegistry) -> Result<Self, PoolError> {
        if config.workers == 0 {
            return Err(PoolError::Actor("a pool needs at least one worker".into()));
        }

        let id = PoolId::new();
        let pool_name = format!("pool-{}", id);
        let handlers = Arc::new(handlers);
        let (event_tx, _) = broadcast::channel(1024);
        let results: SharedResults = Arc::new(Mutex::new(Vec::new()));

        tracing::info!(
            "Starting {} with {} workers (handlers: {:?})",
            pool_name,
            config.workers,
            handlers.job_types()
        );

        let (queue, queue_handle) = Actor::spawn(
            Some(pool_name.clone()),
            QueueActor,
            QueueArgs {
                pool_name: pool_name.clone(),
                max_pending: config.max_pending,
                start_frozen: config.start_frozen,
                handlers: handlers.clone(),
                event_tx: event_tx.clone(),
            },
        )
        .await
        .map_err(|e| PoolError::Actor(format!("Failed to spawn queue: {}", e)))?;

        let mut workers = Vec::with_capacity(config.workers as usize);
        for n in 1..=config.workers {
            let worker_id = format!("{}-worker-{}", pool_name, n);
            let args = WorkerArgs {
                worker_id: worker_id.clone(),
                queue: queue.clone(),
                handlers: handlers.clone(),
                results: results.clone(),
                event_tx: event_tx.clone(),
            };

            match Actor::spawn_linked(Some(worker_id), WorkerActor, args, queue.get_cell()).await {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    for (worker, _) in &workers {
                        worker.stop(None);
                    }
                    queue.stop(None);
                    return Err(PoolError::Actor(format!("Failed to spawn worker: {}", e)));
                }
            }
        }

        Ok(Self {
            id,
            queue,
            queue_handle,
            workers,
            results,
            event_tx,
        })
    }

    /// Enqueue a job. Returns as soon as the queue has accepted it.
    pub async fn submit(&self, job: Job) -> Result<JobId, PoolError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.queue
            .send_message(QueueMessage::Enqueue {
                job: Box::new(job),
                reply: tx.into(),
            })
            .map_err(|e| PoolError::Actor(format!("Failed to send message: {}", e)))?;

        rx.await
            .map_err(|_| PoolError::Actor("Failed to receive response".into()))?
    }

    /// Pause dispatching. Queued jobs are kept and running jobs finish.
    pub fn freeze(&self) -> Result<(), PoolError> {
        self.queue
            .send_message(QueueMessage::Freeze)
            .map_err(|e| PoolError::Actor(format!("Failed to send message: {}", e)))
    }

    /// Resume dispatching after [`WorkerPool::freeze`].
    pub fn unfreeze(&self) -> Result<(), PoolError> {
        self.queue
            .send_message(QueueMessage::Unfreeze)
            .map_err(|e| PoolError::Actor(format!("Failed to send message: {}", e)))
    }

    pub async fn stats(&self) -> Result<PoolStats, PoolError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.queue
            .send_message(QueueMessage::GetStats { reply: tx.into() })
            .map_err(|e| PoolError::Actor(format!("Failed to send message: {}", e)))?;

        rx.await
            .map_err(|_| PoolError::Actor("Failed to receive response".into()))
    }

    /// Outcomes of jobs submitted with `keep_result`, in completion order.
    pub fn collected_results(&self) -> Result<Vec<CollectedResult>, PoolError> {
        self.results
            .lock()
            .map(|results| results.clone())
            .map_err(|_| PoolError::Poisoned("collected results lock poisoned".into()))
    }

    pub fn clear_collected_results(&self) -> Result<(), PoolError> {
        self.results
            .lock()
            .map(|mut results| results.clear())
            .map_err(|_| PoolError::Poisoned("collected results lock poisoned".into()))
    }

    /// Subscribe to pool events.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.event_tx.subscribe()
    }

    /// Wait until every accepted job has finished.
    ///
    /// Leaves the frozen state and rejects new submissions from the moment
    /// it is called. Workers stay alive; see [`WorkerPool::drain_and_stop`].
    pub async fn drain(&self) -> Result<(), PoolError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.queue
            .send_message(QueueMessage::Drain { reply: tx.into() })
            .map_err(|e| PoolError::Actor(format!("Failed to send message: {}", e)))?;

        rx.await
            .map_err(|_| PoolError::Actor("Failed to receive response".into()))?
    }

    /// Drain, then send one shutdown sentinel per worker and wait for each
    /// worker and the queue actor to exit.
    ///
    /// Workers are stopped even when draining fails; the drain error is
    /// returned afterwards.
    pub async fn drain_and_stop(self) -> Result<(), PoolError> {
        let drained = self.drain().await;

        for (worker, _) in &self.workers {
            if worker.send_message(WorkerMessage::Shutdown).is_err() {
                tracing::debug!("Worker {:?} already stopped", worker.get_name());
            }
        }
        for (_, handle) in self.workers {
            if let Err(e) = handle.await {
                tracing::warn!("Worker task ended abnormally: {}", e);
            }
        }

        self.queue.stop(None);
        if let Err(e) = self.queue_handle.await {
            tracing::warn!("Queue task ended abnormally: {}", e);
        }

        tracing::info!("Pool {} stopped", self.id);
        drained
    }
}
