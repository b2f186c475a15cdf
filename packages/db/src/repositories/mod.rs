//! Repository implementations for database operations.

mod transcription_repo;

pub use transcription_repo::TranscriptionRepository;
