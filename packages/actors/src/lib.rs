//! Actor system for the worker pool.
//!
//! This crate provides the Ractor-based pool that runs transcription jobs
//! (or any other registered job type) on a fixed set of workers.
//!
//! # Architecture
//!
//! - `WorkerPool` - Handle that starts the actors and exposes pool operations
//! - `QueueActor` - Owns the FIFO of pending jobs and dispatches to idle workers
//! - `WorkerActor` - Executes one job at a time inside a failure boundary
//!
//! # Usage
//!
//! ```ignore
//! use actors::{JobHandlerRegistry, WorkerPool, job_handler};
//!
//! let mut handlers = JobHandlerRegistry::new();
//! handlers.register(job_handler!("echo", |job| {
//!     Ok(JobResult::with_output("echo", job.payload))
//! }));
//!
//! let pool = WorkerPool::start(PoolConfig::default(), handlers).await?;
//! let id = pool.submit(Job::new("echo", json!(["hello"]))).await?;
//! pool.drain_and_stop().await?;
//! ```

mod handler;
mod messages;
mod pool;
mod queue_actor;
mod worker_actor;

pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, JobHandlerRegistry};
pub use messages::{PoolError, QueueMessage, WorkerMessage};
pub use pool::WorkerPool;
pub use queue_actor::QueueActor;
pub use worker_actor::WorkerActor;

pub use transcriber_core::{Job, JobResult};
