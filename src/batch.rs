//! Parallel batch runner.
//!
//! A single simulation is strictly sequential. Independent simulations
//! (parameter sweeps, replicas with different seeds) share nothing, so they
//! can run side by side. The runner owns a bounded pool of worker threads;
//! every job builds its own `Engine` inside the worker and runs it to
//! completion, so no reaction ever crosses a thread boundary.

use std::fmt;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::{Engine, RunReport};
use crate::error::{ExecutionError, KernelError, KernelResult, ValidationError};

/// Worker pool configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued simulations.
    pub queue_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
        }
    }
}

impl BatchConfig {
    /// Validate pool bounds.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` for zero workers or capacity.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "workers must be > 0".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "queue_capacity must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Stable identifier for a simulation in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimulationId(Uuid);

impl SimulationId {
    /// Create a new random simulation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SimulationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds a ready-to-run engine on the worker thread.
pub type SimulationFactory = Box<dyn FnOnce() -> KernelResult<Engine> + Send>;

/// Result of one simulation.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Identity assigned at submission.
    pub id: SimulationId,
    /// Report of the run, or the error that stopped it.
    pub result: KernelResult<RunReport>,
}

struct Job {
    id: SimulationId,
    build: SimulationFactory,
    reply: Sender<BatchOutcome>,
}

fn run_job(id: SimulationId, build: SimulationFactory) -> BatchOutcome {
    let result = build().and_then(|mut engine| engine.run());
    match &result {
        Ok(report) => debug!(simulation = %id, steps = report.steps, "simulation finished"),
        Err(err) => warn!(simulation = %id, error = %err, "simulation failed"),
    }
    BatchOutcome { id, result }
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(workers: usize, queue_capacity: usize) -> KernelResult<Self> {
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("alembic-batch-{idx}"))
                .spawn(move || {
                    while let Ok(Job { id, build, reply }) = rx.recv() {
                        let _ = reply.send(run_job(id, build));
                    }
                })
                .map_err(|err| KernelError::internal(format!("failed to spawn batch worker: {err}")))?;
            handles.push(handle);
        }

        Ok(Self {
            tx,
            workers: handles,
            queue_capacity,
        })
    }

    fn try_submit(&self, job: Job) -> KernelResult<()> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(KernelError::Execution(ExecutionError::QueueFull {
                capacity: self.queue_capacity,
            })),
            Err(TrySendError::Disconnected(_)) => Err(KernelError::Execution(ExecutionError::Disconnected)),
        }
    }

    fn submit(&self, job: Job) -> KernelResult<()> {
        self.tx
            .send(job)
            .map_err(|_| KernelError::Execution(ExecutionError::Disconnected))
    }

    fn shutdown(self) {
        // Closing the channel lets workers drain queued jobs, then exit.
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

/// Handle to a submitted simulation.
pub struct SimulationHandle {
    id: SimulationId,
    rx: Receiver<BatchOutcome>,
}

impl SimulationHandle {
    /// Identity assigned at submission.
    #[must_use]
    pub const fn id(&self) -> SimulationId {
        self.id
    }

    /// Waits for the simulation to complete.
    ///
    /// A worker that dies mid-run is reported as `Disconnected`.
    #[must_use]
    pub fn join(self) -> BatchOutcome {
        let id = self.id;
        self.rx.recv().unwrap_or_else(|_| BatchOutcome {
            id,
            result: Err(KernelError::Execution(ExecutionError::Disconnected)),
        })
    }
}

/// Runs independent simulations on a bounded worker pool.
pub struct BatchRunner {
    pool: Option<WorkerPool>,
}

impl BatchRunner {
    /// Starts the worker threads.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid config, or an internal
    /// error if a worker thread cannot be spawned.
    pub fn new(config: BatchConfig) -> KernelResult<Self> {
        config.validate()?;
        let pool = WorkerPool::start(config.workers, config.queue_capacity)?;
        Ok(Self { pool: Some(pool) })
    }

    fn pool(&self) -> KernelResult<&WorkerPool> {
        self.pool
            .as_ref()
            .ok_or(KernelError::Execution(ExecutionError::Disconnected))
    }

    /// Queues a simulation without blocking.
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` when the queue is at capacity.
    pub fn try_submit(&self, build: SimulationFactory) -> KernelResult<SimulationHandle> {
        let (reply, rx) = bounded(1);
        let id = SimulationId::new();
        self.pool()?.try_submit(Job { id, build, reply })?;
        Ok(SimulationHandle { id, rx })
    }

    /// Runs every simulation and returns the outcomes in submission order.
    ///
    /// Submission blocks while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` if the pool is gone. Failures of individual
    /// simulations are reported in their outcome instead.
    pub fn run_all(&self, jobs: Vec<SimulationFactory>) -> KernelResult<Vec<BatchOutcome>> {
        let pool = self.pool()?;
        let mut handles = Vec::with_capacity(jobs.len());
        for build in jobs {
            let (reply, rx) = bounded(1);
            let id = SimulationId::new();
            pool.submit(Job { id, build, reply })?;
            handles.push(SimulationHandle { id, rx });
        }
        Ok(handles.into_iter().map(SimulationHandle::join).collect())
    }
}

impl Drop for BatchRunner {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}
