//! Transcription status as seen by pollers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Status of a submitted transcription.
///
/// `InProgress` is the only non-terminal state. An entry leaves it exactly
/// once and is never rewritten afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    InProgress,
    Completed {
        text: String,
    },
    Error,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Error => "error",
        }
    }
}

/// One keyed entry in the result store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub job_id: String,
    pub status: JobStatus,
    /// Failure detail for operators. Never shown to pollers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StatusEntry {
    /// A freshly registered, still running job.
    pub fn in_progress(job_id: JobId) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::InProgress,
            detail: None,
            submitted_at: now,
            updated_at: now,
        }
    }
}

/// What the status endpoint answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub id: String,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl StatusResponse {
    pub fn new(id: JobId, status: JobStatus) -> Self {
        Self {
            id: id.to_string(),
            status,
        }
    }
}
