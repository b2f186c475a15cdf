//! Core domain types for the transcription job system.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobOutcome and CollectedResult for work items
//! - JobStatus and StatusEntry for what pollers see
//! - Pool configuration, state and statistics
//! - Events emitted by the pool

mod events;
mod job;
mod pool;
mod status;

pub use events::PoolEvent;
pub use job::{CollectedResult, Job, JobId, JobOutcome, JobResult};
pub use pool::{PoolConfig, PoolId, PoolState, PoolStats};
pub use status::{JobStatus, StatusEntry, StatusResponse};
