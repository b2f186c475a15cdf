//! Queue actor: the pool's FIFO of pending jobs and its dispatcher.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent};
use tokio::sync::broadcast;
use transcriber_core::{Job, PoolEvent, PoolState, PoolStats};

use crate::handler::JobHandlerRegistry;
use crate::messages::{PoolError, QueueMessage, WorkerMessage};

/// State for the queue actor.
///
/// All pool counters live here; the actor's mailbox serializes every
/// mutation, so no lock is needed for them.
pub struct QueueActorState {
    pool_name: String,
    state: PoolState,
    max_pending: Option<usize>,
    /// Pending jobs in submission order.
    pending: VecDeque<Job>,
    /// Workers waiting for a job.
    idle: VecDeque<(String, ActorRef<WorkerMessage>)>,
    in_flight: u64,
    workers: u32,
    started: u64,
    completed: u64,
    failed: u64,
    handlers: Arc<JobHandlerRegistry>,
    /// Callers waiting for the pool to drain.
    drain_waiters: Vec<RpcReplyPort<Result<(), PoolError>>>,
    event_tx: broadcast::Sender<PoolEvent>,
}

impl QueueActorState {
    fn broadcast(&self, event: PoolEvent) {
        let _ = self.event_tx.send(event);
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            state: self.state,
            workers: self.workers,
            pending: self.pending.len() as u64,
            in_flight: self.in_flight,
            started: self.started,
            completed: self.completed,
            failed: self.failed,
        }
    }

    fn enqueue(&mut self, job: Job) -> Result<Job, PoolError> {
        if !self.state.is_accepting_jobs() {
            return Err(match self.state {
                PoolState::Poisoned => PoolError::Poisoned(format!(
                    "pool {} no longer accepts jobs",
                    self.pool_name
                )),
                _ => PoolError::ShuttingDown,
            });
        }

        if !self.handlers.handles(&job) {
            return Err(PoolError::NoHandler(job.job_type));
        }

        if let Some(max_pending) = self.max_pending
            && self.pending.len() >= max_pending
        {
            return Err(PoolError::QueueFull(max_pending));
        }

        self.pending.push_back(job.clone());
        Ok(job)
    }

    /// Hand pending jobs to idle workers, oldest job first.
    fn dispatch(&mut self) {
        if !self.state.is_dispatching() {
            return;
        }

        while !self.pending.is_empty() {
            let Some((worker_id, worker)) = self.idle.pop_front() else {
                break;
            };
            let Some(job) = self.pending.pop_front() else {
                self.idle.push_front((worker_id, worker));
                break;
            };

            let job_id = job.id;
            match worker.send_message(WorkerMessage::ProcessJob { job: Box::new(job) }) {
                Ok(()) => {
                    self.in_flight += 1;
                    self.started += 1;
                }
                Err(e) => {
                    // The worker is gone; keep the job for the next one.
                    tracing::warn!("Worker {} rejected job {}: {}", worker_id, job_id, e);
                    if let ractor::MessagingErr::SendErr(WorkerMessage::ProcessJob { job }) = e {
                        self.pending.push_front(*job);
                    }
                }
            }
        }
    }

    /// Release drain waiters once nothing is queued or running.
    fn check_drained(&mut self) {
        if self.state != PoolState::Draining || !self.pending.is_empty() || self.in_flight > 0 {
            return;
        }

        self.state = PoolState::Stopped;
        tracing::info!("Pool {} drained", self.pool_name);
        self.broadcast(PoolEvent::PoolDrained {
            timestamp: Utc::now(),
        });

        for waiter in self.drain_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    /// Stop all work after a pool invariant violation.
    fn poison(&mut self, reason: String) {
        if self.state == PoolState::Poisoned {
            return;
        }

        tracing::error!("Pool {} poisoned: {}", self.pool_name, reason);
        self.state = PoolState::Poisoned;
        self.broadcast(PoolEvent::PoolFatal {
            reason: reason.clone(),
            timestamp: Utc::now(),
        });

        for waiter in self.drain_waiters.drain(..) {
            let _ = waiter.send(Err(PoolError::Poisoned(reason.clone())));
        }
    }
}

/// Queue actor arguments.
pub struct QueueArgs {
    pub pool_name: String,
    pub max_pending: Option<usize>,
    pub start_frozen: bool,
    pub handlers: Arc<JobHandlerRegistry>,
    pub event_tx: broadcast::Sender<PoolEvent>,
}

/// Queue actor that owns pending jobs and dispatches them to workers.
///
/// Workers are linked children of this actor, so a crashed worker shows up
/// here as a supervision event.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting queue actor: {}", args.pool_name);

        Ok(QueueActorState {
            pool_name: args.pool_name,
            state: if args.start_frozen {
                PoolState::Frozen
            } else {
                PoolState::Running
            },
            max_pending: args.max_pending,
            pending: VecDeque::new(),
            idle: VecDeque::new(),
            in_flight: 0,
            workers: 0,
            started: 0,
            completed: 0,
            failed: 0,
            handlers: args.handlers,
            drain_waiters: Vec::new(),
            event_tx: args.event_tx,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Enqueue { job, reply } => match state.enqueue(*job) {
                Ok(job) => {
                    tracing::debug!("Job {} ({}) enqueued", job.id, job.job_type);
                    state.broadcast(PoolEvent::JobEnqueued {
                        job_id: job.id,
                        job_type: job.job_type,
                        timestamp: Utc::now(),
                    });
                    let _ = reply.send(Ok(job.id));
                    state.dispatch();
                }
                Err(e) => {
                    tracing::warn!("Rejected job: {}", e);
                    let _ = reply.send(Err(e));
                }
            },

            QueueMessage::WorkerReady { worker_id, worker } => {
                state.workers += 1;
                state.idle.push_back((worker_id, worker));
                state.dispatch();
            }

            QueueMessage::JobFinished {
                worker_id,
                worker,
                job_id,
                succeeded,
            } => {
                state.in_flight = state.in_flight.saturating_sub(1);
                if succeeded {
                    state.completed += 1;
                } else {
                    state.failed += 1;
                }
                tracing::debug!("{} finished job {}", worker_id, job_id);

                state.idle.push_back((worker_id, worker));
                state.dispatch();
                state.check_drained();
            }

            QueueMessage::Freeze => {
                if state.state == PoolState::Running {
                    state.state = PoolState::Frozen;
                    tracing::info!("Pool {} frozen", state.pool_name);
                    state.broadcast(PoolEvent::PoolFrozen {
                        timestamp: Utc::now(),
                    });
                }
            }

            QueueMessage::Unfreeze => {
                if state.state == PoolState::Frozen {
                    state.state = PoolState::Running;
                    tracing::info!("Pool {} resumed", state.pool_name);
                    state.broadcast(PoolEvent::PoolResumed {
                        timestamp: Utc::now(),
                    });
                    state.dispatch();
                }
            }

            QueueMessage::Drain { reply } => match state.state {
                PoolState::Poisoned => {
                    let _ = reply.send(Err(PoolError::Poisoned(format!(
                        "pool {} cannot drain",
                        state.pool_name
                    ))));
                }
                PoolState::Stopped => {
                    let _ = reply.send(Ok(()));
                }
                PoolState::Running | PoolState::Frozen | PoolState::Draining => {
                    if state.state == PoolState::Frozen {
                        state.broadcast(PoolEvent::PoolResumed {
                            timestamp: Utc::now(),
                        });
                    }
                    state.state = PoolState::Draining;
                    tracing::info!(
                        "Draining pool {}: {} pending, {} in flight",
                        state.pool_name,
                        state.pending.len(),
                        state.in_flight
                    );
                    state.drain_waiters.push(reply);
                    state.dispatch();
                    state.check_drained();
                }
            },

            QueueMessage::GetStats { reply } => {
                let _ = reply.send(state.stats());
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                let worker_id = cell.get_name().unwrap_or_default();
                tracing::debug!("Worker {} exited: {:?}", worker_id, reason);
                state.workers = state.workers.saturating_sub(1);
                state.idle.retain(|(id, _)| *id != worker_id);
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                let worker_id = cell.get_name().unwrap_or_default();
                state.workers = state.workers.saturating_sub(1);
                state.idle.retain(|(id, _)| *id != worker_id);
                state.poison(format!("worker {} failed: {}", worker_id, error));
            }
            _ => {}
        }
        Ok(())
    }
}
