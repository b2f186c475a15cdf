//! Transcriber front end.
//!
//! This crate wires the pool, the result store and upload storage together:
//! - Configuration from the environment
//! - Upload admission (size, extension, empty payloads)
//! - Job submission and status lookup

mod admission;
mod config;
mod gateway;
mod init;

pub use admission::{AdmissionError, AdmissionPolicy, DEFAULT_MAX_UPLOAD_BYTES, Upload};
pub use config::{AppConfig, ConfigError, PipelineConfig};
pub use gateway::{Gateway, GatewayError};
pub use init::{InitError, build_gateway, init_transcriber};

// Re-export core types for convenience
pub use transcriber_core::{JobId, JobStatus, PoolEvent, PoolStats, StatusResponse};
