//! Worker pool domain types.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub Ulid);

impl PoolId {
    /// Create a new unique pool ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PoolId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current operational state of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Accepting and dispatching jobs.
    #[default]
    Running,
    /// Accepting jobs but handing none to workers.
    Frozen,
    /// Finishing queued and running jobs, accepting nothing new.
    Draining,
    /// Drained; workers are being or have been released.
    Stopped,
    /// A pool invariant was violated. Nothing is accepted or dispatched.
    Poisoned,
}

impl PoolState {
    /// Check if the pool takes new submissions.
    pub fn is_accepting_jobs(self) -> bool {
        matches!(self, PoolState::Running | PoolState::Frozen)
    }

    /// Check if queued jobs may be handed to workers.
    pub fn is_dispatching(self) -> bool {
        matches!(self, PoolState::Running | PoolState::Draining)
    }
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolState::Running => write!(f, "running"),
            PoolState::Frozen => write!(f, "frozen"),
            PoolState::Draining => write!(f, "draining"),
            PoolState::Stopped => write!(f, "stopped"),
            PoolState::Poisoned => write!(f, "poisoned"),
        }
    }
}

/// Configuration for pool behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of long-lived workers.
    pub workers: u32,
    /// Maximum number of queued jobs. `None` keeps the queue unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pending: Option<usize>,
    /// Start with dispatching paused.
    pub start_frozen: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 16,
            max_pending: None,
            start_frozen: false,
        }
    }
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: u32) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = Some(max_pending);
        self
    }

    pub fn frozen(mut self) -> Self {
        self.start_frozen = true;
        self
    }
}

/// Statistics for a pool's current state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolStats {
    pub state: PoolState,
    /// Live worker count.
    pub workers: u32,
    /// Jobs waiting in the queue.
    pub pending: u64,
    /// Jobs handed to a worker and not yet finished.
    pub in_flight: u64,
    /// Jobs handed to a worker since start.
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
}

impl PoolStats {
    /// Total finished jobs.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }
}
