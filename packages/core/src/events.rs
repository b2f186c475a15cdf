//! Event types emitted by the worker pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Events emitted by the worker pool for observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PoolEvent {
    // Job events
    /// A job was accepted into the queue.
    JobEnqueued {
        job_id: JobId,
        job_type: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker took a job.
    JobStarted {
        job_id: JobId,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A job's handler returned successfully.
    JobCompleted {
        job_id: JobId,
        worker_id: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job's handler returned an error or panicked.
    JobFailed {
        job_id: JobId,
        worker_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    // Pool events
    PoolFrozen { timestamp: DateTime<Utc> },
    PoolResumed { timestamp: DateTime<Utc> },
    /// Every submitted job has finished after a drain request.
    PoolDrained { timestamp: DateTime<Utc> },
    /// A worker exited its loop.
    WorkerStopped {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A pool invariant was violated; the host process should be restarted.
    PoolFatal {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl PoolEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PoolEvent::JobEnqueued { timestamp, .. }
            | PoolEvent::JobStarted { timestamp, .. }
            | PoolEvent::JobCompleted { timestamp, .. }
            | PoolEvent::JobFailed { timestamp, .. }
            | PoolEvent::PoolFrozen { timestamp }
            | PoolEvent::PoolResumed { timestamp }
            | PoolEvent::PoolDrained { timestamp }
            | PoolEvent::WorkerStopped { timestamp, .. }
            | PoolEvent::PoolFatal { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            PoolEvent::JobEnqueued { job_id, .. }
            | PoolEvent::JobStarted { job_id, .. }
            | PoolEvent::JobCompleted { job_id, .. }
            | PoolEvent::JobFailed { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// Check if the event signals a pool invariant violation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PoolEvent::PoolFatal { .. })
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            PoolEvent::JobEnqueued {
                job_id, job_type, ..
            } => format!("Job {} ({}) enqueued", job_id, job_type),
            PoolEvent::JobStarted {
                job_id, worker_id, ..
            } => format!("Job {} started by {}", job_id, worker_id),
            PoolEvent::JobCompleted {
                job_id,
                duration_ms,
                ..
            } => format!("Job {} completed in {}ms", job_id, duration_ms),
            PoolEvent::JobFailed { job_id, error, .. } => {
                format!("Job {} failed: {}", job_id, error)
            }
            PoolEvent::PoolFrozen { .. } => "Pool frozen".to_string(),
            PoolEvent::PoolResumed { .. } => "Pool resumed".to_string(),
            PoolEvent::PoolDrained { .. } => "Pool drained".to_string(),
            PoolEvent::WorkerStopped { worker_id, .. } => format!("Worker {} stopped", worker_id),
            PoolEvent::PoolFatal { reason, .. } => format!("Pool fatal: {}", reason),
        }
    }
}
