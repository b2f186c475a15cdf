//! Transcription pipeline.
//!
//! - `RecognitionPipeline` - Seam to the speech recognizer
//! - `CommandPipeline` - Recognizer run as an external program, with optional ffmpeg conversion
//! - `TranscriptionHandler` - Job handler that drives one upload through the recognizer

mod command;
mod error;
mod handler;
mod recognizer;

pub use command::CommandPipeline;
pub use error::PipelineError;
pub use handler::{TRANSCRIBE_JOB_TYPE, TranscriptionHandler, TranscriptionPayload};
pub use recognizer::{PipelineFuture, RecognitionPipeline};
