//! Database schema definitions using SurrealQL.

use crate::{DbError, get_db};

/// Initialize the database schema.
pub async fn init_schema() -> Result<(), DbError> {
    let db = get_db()?;

    tracing::info!("Initializing database schema...");

    db.query(TRANSCRIPTION_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Transcription status table.
///
/// `status` holds the tagged status object, so the table stays schemaless
/// and only the top-level fields are typed.
const TRANSCRIPTION_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS transcription SCHEMALESS;

DEFINE FIELD IF NOT EXISTS job_id ON transcription TYPE string;
DEFINE FIELD IF NOT EXISTS status ON transcription TYPE object;
DEFINE FIELD IF NOT EXISTS submitted_at ON transcription TYPE string;
DEFINE FIELD IF NOT EXISTS updated_at ON transcription TYPE string;

DEFINE INDEX IF NOT EXISTS transcription_job ON transcription FIELDS job_id UNIQUE;
DEFINE INDEX IF NOT EXISTS transcription_status ON transcription FIELDS status.status;
"#;
