//! Job domain types for work items handed to the worker pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s.trim())?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a job whose handler returned successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Human-readable summary of the result.
    pub summary: String,
    /// Optional structured output data as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
}

impl JobResult {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            output: None,
        }
    }

    pub fn with_output(summary: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            summary: summary.into(),
            output: Some(output),
        }
    }
}

/// Tagged outcome of running one job.
///
/// A failed job is an ordinary, per-job result. It is logged and recorded,
/// never escalated beyond the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed { result: JobResult },
    Failed { error: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// A job represents a unit of work to be executed by the worker pool.
///
/// Jobs are immutable once enqueued: the queue owns them until a worker
/// takes one, then that worker owns it until the outcome is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Type of job (used for routing to handlers).
    pub job_type: String,
    /// Job payload as JSON, the argument handed to the handler.
    pub payload: serde_json::Value,
    /// When the job was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Whether the pool should retain `(job, outcome)` after execution.
    #[serde(default)]
    pub keep_result: bool,
}

impl Job {
    /// Create a new job with a fresh identifier.
    pub fn new(job_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::with_id(JobId::new(), job_type, payload)
    }

    /// Create a job under an identifier that was allocated elsewhere.
    pub fn with_id(id: JobId, job_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id,
            job_type: job_type.into(),
            payload,
            submitted_at: Utc::now(),
            keep_result: false,
        }
    }

    /// Ask the pool to retain this job's outcome.
    pub fn keep_result(mut self) -> Self {
        self.keep_result = true;
        self
    }
}

/// A retained `(job, outcome)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedResult {
    pub job: Job,
    pub outcome: JobOutcome,
}
