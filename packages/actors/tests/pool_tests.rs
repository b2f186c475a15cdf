use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use actors::{FnHandler, HandlerFuture, JobHandlerRegistry, PoolError, WorkerPool, job_handler};
use serde_json::json;
use tokio::sync::Semaphore;
use transcriber_core::{Job, JobId, JobOutcome, JobResult, PoolConfig, PoolEvent, PoolState, PoolStats};

fn echo_handlers() -> JobHandlerRegistry {
    let mut handlers = JobHandlerRegistry::new();
    handlers.register(job_handler!("echo", |job| {
        Ok(JobResult::with_output("echo", job.payload))
    }));
    handlers
}

/// Panics on "panic", errors on "error", echoes anything else.
fn flaky_handlers() -> JobHandlerRegistry {
    let mut handlers = echo_handlers();
    handlers.register(FnHandler::new("flaky", |job: &Job| {
        let payload = job.payload.clone();
        let fut: HandlerFuture = Box::pin(async move {
            if payload == json!("panic") {
                panic!("handler blew up");
            }
            if payload == json!("error") {
                return Err("recognizer exited with status 1".to_string());
            }
            Ok(JobResult::with_output("flaky", payload))
        });
        fut
    }));
    handlers
}

async fn wait_for(pool: &WorkerPool, done: impl Fn(&PoolStats) -> bool) -> PoolStats {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let stats = pool.stats().await.expect("stats");
            if done(&stats) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pool did not reach the expected state in time")
}

#[tokio::test]
async fn test_fifty_jobs_on_four_workers() {
    let pool = WorkerPool::start(PoolConfig::default().with_workers(4), echo_handlers())
        .await
        .expect("start pool");

    let mut submitted = HashSet::new();
    for n in 0..50 {
        let id = pool
            .submit(Job::new("echo", json!(n)).keep_result())
            .await
            .expect("submit");
        submitted.insert(id);
    }
    assert_eq!(submitted.len(), 50);

    let stats = wait_for(&pool, |s| s.processed() == 50).await;
    assert_eq!(stats.completed, 50);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.workers, 4);

    let results = pool.collected_results().expect("results");
    assert_eq!(results.len(), 50);
    let finished: HashSet<_> = results.iter().map(|r| r.job.id).collect();
    assert_eq!(finished, submitted);
    for result in &results {
        match &result.outcome {
            JobOutcome::Completed { result: output } => {
                assert_eq!(output.output, Some(result.job.payload.clone()));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    pool.drain_and_stop().await.expect("drain");
}

#[tokio::test]
async fn test_frozen_pool_starts_nothing_until_unfrozen() {
    let pool = WorkerPool::start(
        PoolConfig::default().with_workers(2).frozen(),
        echo_handlers(),
    )
    .await
    .expect("start pool");

    for n in 0..5 {
        pool.submit(Job::new("echo", json!(n))).await.expect("submit");
    }

    let stats = wait_for(&pool, |s| s.workers == 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats_later = pool.stats().await.expect("stats");
    assert_eq!(stats.state, PoolState::Frozen);
    assert_eq!(stats_later.started, 0);
    assert_eq!(stats_later.pending, 5);

    pool.unfreeze().expect("unfreeze");
    let stats = wait_for(&pool, |s| s.completed == 5).await;
    assert_eq!(stats.state, PoolState::Running);
    assert_eq!(stats.pending, 0);

    pool.freeze().expect("freeze");
    pool.submit(Job::new("echo", json!("late"))).await.expect("submit");
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = pool.stats().await.expect("stats");
    assert_eq!(stats.state, PoolState::Frozen);
    assert_eq!(stats.started, 5);
    assert_eq!(stats.pending, 1);

    // Draining a frozen pool resumes it and runs what is left.
    pool.drain_and_stop().await.expect("drain");
}

#[tokio::test]
async fn test_failing_jobs_do_not_stop_the_pool() {
    let pool = WorkerPool::start(PoolConfig::default().with_workers(2), flaky_handlers())
        .await
        .expect("start pool");

    let panicked = pool
        .submit(Job::new("flaky", json!("panic")).keep_result())
        .await
        .expect("submit");
    let errored = pool
        .submit(Job::new("flaky", json!("error")).keep_result())
        .await
        .expect("submit");
    let fine = pool
        .submit(Job::new("flaky", json!("fine")).keep_result())
        .await
        .expect("submit");

    let stats = wait_for(&pool, |s| s.processed() == 3).await;
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.state, PoolState::Running);
    assert_eq!(stats.workers, 2);

    let results = pool.collected_results().expect("results");
    let outcome_of = |id: JobId| {
        results
            .iter()
            .find(|r| r.job.id == id)
            .map(|r| r.outcome.clone())
            .expect("outcome")
    };

    match outcome_of(panicked) {
        JobOutcome::Failed { error } => assert!(error.contains("handler blew up")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        outcome_of(errored),
        JobOutcome::Failed {
            error: "recognizer exited with status 1".into()
        }
    );
    assert!(outcome_of(fine).is_success());

    // The pool still runs new work after the failures.
    pool.submit(Job::new("echo", json!("after"))).await.expect("submit");
    wait_for(&pool, |s| s.processed() == 4).await;

    pool.drain_and_stop().await.expect("drain");
}

#[tokio::test]
async fn test_results_are_only_kept_on_request() {
    let pool = WorkerPool::start(PoolConfig::default().with_workers(2), echo_handlers())
        .await
        .expect("start pool");

    pool.submit(Job::new("echo", json!("dropped"))).await.expect("submit");
    let kept = pool
        .submit(Job::new("echo", json!("kept")).keep_result())
        .await
        .expect("submit");
    wait_for(&pool, |s| s.processed() == 2).await;

    let results = pool.collected_results().expect("results");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].job.id, kept);

    pool.clear_collected_results().expect("clear");
    assert!(pool.collected_results().expect("results").is_empty());

    pool.drain_and_stop().await.expect("drain");
}

#[tokio::test]
async fn test_submit_is_rejected_while_draining() {
    let gate = Arc::new(Semaphore::new(0));
    let mut handlers = JobHandlerRegistry::new();
    let job_gate = gate.clone();
    handlers.register(FnHandler::new("slow", move |_job: &Job| {
        let gate = job_gate.clone();
        let fut: HandlerFuture = Box::pin(async move {
            let _permit = gate.acquire().await.map_err(|e| e.to_string())?;
            Ok(JobResult::new("slow"))
        });
        fut
    }));

    let pool = WorkerPool::start(PoolConfig::default().with_workers(1), handlers)
        .await
        .expect("start pool");
    pool.submit(Job::new("slow", json!(null))).await.expect("submit");
    pool.submit(Job::new("slow", json!(null))).await.expect("submit");
    wait_for(&pool, |s| s.in_flight == 1).await;

    let (drained, ()) = tokio::join!(pool.drain(), async {
        wait_for(&pool, |s| s.state == PoolState::Draining).await;
        let rejected = pool.submit(Job::new("slow", json!(null))).await;
        assert_eq!(rejected, Err(PoolError::ShuttingDown));
        gate.add_permits(2);
    });
    drained.expect("drain");

    let stats = pool.stats().await.expect("stats");
    assert_eq!(stats.state, PoolState::Stopped);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.pending, 0);

    pool.drain_and_stop().await.expect("stop");
}

#[tokio::test]
async fn test_bounded_queue_rejects_when_full() {
    let pool = WorkerPool::start(
        PoolConfig::default()
            .with_workers(1)
            .with_max_pending(2)
            .frozen(),
        echo_handlers(),
    )
    .await
    .expect("start pool");

    pool.submit(Job::new("echo", json!(1))).await.expect("submit");
    pool.submit(Job::new("echo", json!(2))).await.expect("submit");
    let rejected = pool.submit(Job::new("echo", json!(3))).await;
    assert_eq!(rejected, Err(PoolError::QueueFull(2)));

    pool.drain_and_stop().await.expect("drain");
}

#[tokio::test]
async fn test_unknown_job_type_is_rejected() {
    let pool = WorkerPool::start(PoolConfig::default().with_workers(1), echo_handlers())
        .await
        .expect("start pool");

    let rejected = pool.submit(Job::new("transcribe", json!(null))).await;
    assert_eq!(rejected, Err(PoolError::NoHandler("transcribe".into())));

    pool.drain_and_stop().await.expect("drain");
}

#[tokio::test]
async fn test_pool_needs_a_worker() {
    let started = WorkerPool::start(PoolConfig::default().with_workers(0), echo_handlers()).await;
    assert!(matches!(started, Err(PoolError::Actor(_))));
}

#[tokio::test]
async fn test_events_follow_a_job_and_the_drain() {
    let pool = WorkerPool::start(PoolConfig::default().with_workers(1), echo_handlers())
        .await
        .expect("start pool");
    let mut events = pool.subscribe();

    let id = pool.submit(Job::new("echo", json!("hi"))).await.expect("submit");
    pool.drain_and_stop().await.expect("drain");

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    let position = |pred: &dyn Fn(&PoolEvent) -> bool| seen.iter().position(pred);
    let enqueued = position(&|e| matches!(e, PoolEvent::JobEnqueued { job_id, .. } if *job_id == id));
    let started = position(&|e| matches!(e, PoolEvent::JobStarted { job_id, .. } if *job_id == id));
    let completed = position(&|e| matches!(e, PoolEvent::JobCompleted { job_id, .. } if *job_id == id));
    let drained = position(&|e| matches!(e, PoolEvent::PoolDrained { .. }));

    assert!(enqueued.is_some());
    assert!(enqueued < started);
    assert!(started < completed);
    assert!(completed < drained);
    assert!(seen.iter().any(|e| matches!(e, PoolEvent::WorkerStopped { .. })));
    assert!(!seen.iter().any(PoolEvent::is_fatal));
}
