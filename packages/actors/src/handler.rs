//! Job handlers: the callables a pool runs, keyed by job type.
//!
//! The transcription handler lives in the `pipeline` crate; this module only
//! knows how to look a handler up for a queued job.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use transcriber_core::{Job, JobResult};

/// What a handler produces: the job's output, or the reason it failed.
pub type HandlerResult = Result<JobResult, String>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A callable run by a worker for every job of one type.
///
/// A handler receives the job (its payload is the argument list) and
/// returns a result or an error string. Panics are caught by the worker
/// and reported as failures of that one job.
pub trait JobHandler: Send + Sync + 'static {
    fn job_type(&self) -> &str;

    fn handle(&self, job: &Job) -> HandlerFuture;
}

/// Handlers known to a pool, shared read-only by the queue and its workers.
#[derive(Default, Clone)]
pub struct JobHandlerRegistry {
    by_type: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler. A later handler for the same type replaces the earlier one.
    pub fn register<H: JobHandler>(&mut self, handler: H) {
        let job_type = handler.job_type().to_string();
        if self.by_type.insert(job_type.clone(), Arc::new(handler)).is_some() {
            tracing::warn!("Replaced handler for job type: {}", job_type);
        }
    }

    /// The handler a worker should run for `job`.
    pub fn resolve(&self, job: &Job) -> Option<Arc<dyn JobHandler>> {
        self.by_type.get(&job.job_type).cloned()
    }

    /// Whether `job` can be run at all; checked before it is queued.
    pub fn handles(&self, job: &Job) -> bool {
        self.by_type.contains_key(&job.job_type)
    }

    /// Registered job types, sorted.
    pub fn job_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// A handler built from a closure, mostly for tests and small job types.
pub struct FnHandler<F> {
    job_type: String,
    run: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    pub fn new(job_type: impl Into<String>, run: F) -> Self {
        Self {
            job_type: job_type.into(),
            run,
        }
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&Job) -> HandlerFuture + Send + Sync + 'static,
{
    fn job_type(&self) -> &str {
        &self.job_type
    }

    fn handle(&self, job: &Job) -> HandlerFuture {
        (self.run)(job)
    }
}

/// Build an [`FnHandler`] from an async body that owns a clone of the job.
///
/// ```ignore
/// registry.register(job_handler!("echo", |job| {
///     Ok(JobResult::with_output("echo", job.payload))
/// }));
/// ```
#[macro_export]
macro_rules! job_handler {
    ($job_type:expr, |$job:ident| $body:expr) => {
        $crate::FnHandler::new($job_type, |queued: &$crate::Job| {
            let $job = queued.clone();
            let fut: $crate::HandlerFuture = Box::pin(async move { $body });
            fut
        })
    };
}
