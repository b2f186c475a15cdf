//! Message types for actor communication.

use ractor::{ActorRef, RpcReplyPort};
use transcriber_core::{Job, JobId, PoolStats};

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Enqueue a new job.
    Enqueue {
        job: Box<Job>,
        reply: RpcReplyPort<Result<JobId, PoolError>>,
    },

    /// A worker is ready for its next job.
    WorkerReady {
        worker_id: String,
        worker: ActorRef<WorkerMessage>,
    },

    /// A worker finished a job, successfully or not, and is idle again.
    JobFinished {
        worker_id: String,
        worker: ActorRef<WorkerMessage>,
        job_id: JobId,
        succeeded: bool,
    },

    /// Stop handing jobs to workers.
    Freeze,

    /// Resume handing jobs to workers.
    Unfreeze,

    /// Stop accepting jobs and reply once every accepted job has finished.
    Drain {
        reply: RpcReplyPort<Result<(), PoolError>>,
    },

    /// Get pool stats.
    GetStats { reply: RpcReplyPort<PoolStats> },
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Run a job to completion.
    ProcessJob { job: Box<Job> },

    /// Shutdown sentinel: exit without taking another job.
    Shutdown,
}

/// Error type for pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("No handler for job type: {0}")]
    NoHandler(String),

    #[error("Queue is full ({0} pending jobs)")]
    QueueFull(usize),

    #[error("Pool is shutting down")]
    ShuttingDown,

    #[error("Pool is poisoned: {0}")]
    Poisoned(String),

    #[error("Actor error: {0}")]
    Actor(String),
}
