use std::time::Duration;

use storage::StorageError;

/// Error type for one transcription attempt.
///
/// Callers only ever see `error`; the variant and its detail go to the log
/// and to the result store's operator-facing record.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid job payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("audio conversion failed (exit code {exit_code:?}): {stderr}")]
    Conversion {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("recognizer failed (exit code {exit_code:?}): {stderr}")]
    Recognizer {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("recognizer produced no text")]
    EmptyTranscript,

    #[error("recognition timed out after {0:?}")]
    Timeout(Duration),

    #[error("recognizer panicked: {0}")]
    Panicked(String),

    #[error("upload storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
