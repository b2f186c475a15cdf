//! Transcription status repository.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;
use transcriber_core::{JobId, JobStatus, StatusEntry};

use crate::{DbError, get_db};

/// Repository for transcription status records.
pub struct TranscriptionRepository;

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
struct TranscriptionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    #[serde(flatten)]
    entry: StatusEntry,
}

impl TranscriptionRepository {
    /// Record a freshly submitted job as in progress.
    pub async fn register(id: JobId) -> Result<StatusEntry, DbError> {
        let db = get_db()?;

        if Self::get(id).await?.is_some() {
            return Err(DbError::AlreadyRegistered(id.to_string()));
        }

        let record: Option<TranscriptionRecord> = db
            .create(("transcription", id.to_string()))
            .content(StatusEntry::in_progress(id))
            .await?;

        record
            .map(|r| r.entry)
            .ok_or_else(|| DbError::Query(format!("Failed to register job {}", id)))
    }

    /// Move an in-progress entry to its terminal status.
    ///
    /// The update only matches entries still in progress, so a second
    /// write for the same job fails instead of overwriting the first.
    pub async fn finish(
        id: JobId,
        status: JobStatus,
        detail: Option<String>,
    ) -> Result<StatusEntry, DbError> {
        if !status.is_terminal() {
            return Err(DbError::Query(format!(
                "Job {} can only move to a terminal status",
                id
            )));
        }

        let db = get_db()?;

        let mut response = db
            .query(
                r#"
                UPDATE type::thing("transcription", $id)
                SET status = $status, detail = $detail, updated_at = $updated_at
                WHERE status.status = "in_progress"
                RETURN AFTER
                "#,
            )
            .bind(("id", id.to_string()))
            .bind(("status", serde_json::to_value(&status)?))
            .bind(("detail", detail))
            .bind(("updated_at", Utc::now().to_rfc3339()))
            .await?;

        let records: Vec<TranscriptionRecord> = response.take(0)?;

        if let Some(record) = records.into_iter().next() {
            return Ok(record.entry);
        }

        match Self::get(id).await? {
            Some(_) => Err(DbError::AlreadyTerminal(id.to_string())),
            None => Err(DbError::NotFound(format!("Job not registered: {}", id))),
        }
    }

    /// Get the entry for a job, if it was ever registered.
    pub async fn get(id: JobId) -> Result<Option<StatusEntry>, DbError> {
        let db = get_db()?;

        let record: Option<TranscriptionRecord> =
            db.select(("transcription", id.to_string())).await?;

        Ok(record.map(|r| r.entry))
    }
}
