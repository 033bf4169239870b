//! Workers that claim and execute jobs.
//!
//! A [`Worker`] listens on an ordered list of queues and runs one job at a
//! time. Each iteration of its loop:
//!
//! 1. checks for a shutdown request
//! 2. asks [`Queue::dequeue_any`] for the next job, in queue priority order
//! 3. runs the job, turning errors and panics into an `ExecutionFault`
//!
//! A malformed payload or a failing job is logged and counted, and the loop
//! moves on. Only store failures end the loop with an error.
//!
//! In burst mode the loop ends as soon as every queue is empty. Otherwise it
//! waits for new work, in slices of `poll_timeout`, until shut down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::connection::Connection;
use crate::error::{ConfigError, QueueError, WorkerError};
use crate::job::{Job, JobOutcome};
use crate::metrics::MetricsCollector;
use crate::queue::Queue;
use crate::registry::TaskRegistry;

/// Default longest wait on the store before re-checking for shutdown.
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether a worker is currently running a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No job claimed.
    Idle,
    /// Running a claimed job.
    Executing,
}

/// Statistics about a worker.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Total number of jobs that completed.
    pub jobs_completed: u64,
    /// Total number of jobs whose function failed.
    pub jobs_failed: u64,
    /// Total number of malformed payloads consumed.
    pub dequeue_errors: u64,
    /// Average job execution duration.
    pub average_job_duration: Duration,
}

impl WorkerStats {
    /// Returns the total number of jobs executed (completed + failed).
    pub fn total_processed(&self) -> u64 {
        self.jobs_completed + self.jobs_failed
    }

    /// Returns the success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            return 0.0;
        }
        (self.jobs_completed as f64 / total as f64) * 100.0
    }
}

/// Counters shared between a worker and whoever observes it.
struct SharedWorkerStats {
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    dequeue_errors: AtomicU64,
    total_duration_ms: AtomicU64,
    executing: AtomicU64,
}

impl SharedWorkerStats {
    fn new() -> Self {
        Self {
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            dequeue_errors: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            executing: AtomicU64::new(0),
        }
    }

    fn record_completion(&self, duration: Duration) {
        self.jobs_completed.fetch_add(1, Ordering::SeqCst);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    fn record_failure(&self, duration: Duration) {
        self.jobs_failed.fetch_add(1, Ordering::SeqCst);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    fn record_dequeue_error(&self) {
        self.dequeue_errors.fetch_add(1, Ordering::SeqCst);
    }

    fn to_worker_stats(&self) -> WorkerStats {
        let completed = self.jobs_completed.load(Ordering::SeqCst);
        let failed = self.jobs_failed.load(Ordering::SeqCst);
        let total_duration_ms = self.total_duration_ms.load(Ordering::SeqCst);

        let total_jobs = completed + failed;
        let average_duration = if total_jobs > 0 {
            Duration::from_millis(total_duration_ms / total_jobs)
        } else {
            Duration::ZERO
        };

        WorkerStats {
            jobs_completed: completed,
            jobs_failed: failed,
            dequeue_errors: self.dequeue_errors.load(Ordering::SeqCst),
            average_job_duration: average_duration,
        }
    }
}

/// Requests that a worker stop after its current job.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Signals the worker to stop.
    pub fn shutdown(&self) {
        // Ignore send error - the worker may have already stopped
        let _ = self.tx.send(());
    }
}

/// Executes jobs from an ordered list of queues, one at a time.
pub struct Worker {
    /// Name used in logs and outcomes.
    name: String,
    /// Queues to listen on, highest priority first.
    queues: Vec<Queue>,
    /// Functions jobs may call.
    registry: Arc<TaskRegistry>,
    /// Longest single wait on the store in continuous mode.
    poll_timeout: Duration,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
    stats: Arc<SharedWorkerStats>,
    metrics: MetricsCollector,
}

impl Worker {
    /// Creates a worker listening on `queues`, highest priority first.
    pub fn new(queues: Vec<Queue>, registry: Arc<TaskRegistry>) -> Self {
        // Buffer size of 1 is sufficient since we only act on the first signal
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            name: format!("worker-{}", Uuid::new_v4().simple()),
            queues,
            registry,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            shutdown_tx,
            shutdown_rx,
            stats: Arc::new(SharedWorkerStats::new()),
            metrics: MetricsCollector::new(),
        }
    }

    /// Creates a worker from configuration, with every queue in `conn`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn from_config(
        config: &WorkerConfig,
        conn: Connection,
        registry: Arc<TaskRegistry>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let queues = config
            .queues
            .iter()
            .map(|name| Queue::new(Arc::clone(&conn), name.as_str()))
            .collect();

        let mut worker = Self::new(queues, registry).with_poll_timeout(config.poll_timeout);
        if let Some(name) = &config.name {
            worker = worker.with_name(name.as_str());
        }
        Ok(worker)
    }

    /// Sets the worker name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues this worker listens on, highest priority first.
    pub fn queues(&self) -> &[Queue] {
        &self.queues
    }

    /// Returns a handle that can stop this worker from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Returns current worker statistics.
    pub fn stats(&self) -> WorkerStats {
        self.stats.to_worker_stats()
    }

    pub fn state(&self) -> WorkerState {
        if self.stats.executing.load(Ordering::SeqCst) > 0 {
            WorkerState::Executing
        } else {
            WorkerState::Idle
        }
    }

    /// Runs the work loop.
    ///
    /// With `burst` set, returns once every queue is empty. Otherwise runs
    /// until a shutdown is requested through a [`ShutdownHandle`]. Shutdown
    /// requests made while no `work` call is running are discarded.
    ///
    /// # Returns
    ///
    /// Whether at least one job was executed during this call.
    ///
    /// # Errors
    ///
    /// - `WorkerError::NoQueues` if the worker has no queues
    /// - `WorkerError::Queue` if the store fails
    pub async fn work(&mut self, burst: bool) -> Result<bool, WorkerError> {
        if self.queues.is_empty() {
            return Err(WorkerError::NoQueues);
        }

        // Drop signals left over from before this call.
        self.shutdown_rx = self.shutdown_rx.resubscribe();

        let queue_names: Vec<&str> = self.queues.iter().map(Queue::name).collect();
        info!(
            worker = %self.name,
            queues = ?queue_names,
            burst = burst,
            "Worker started"
        );

        self.metrics.worker_started();
        let result = self.run(burst).await;
        self.metrics.worker_stopped();

        match &result {
            Ok(did_work) => info!(worker = %self.name, did_work = did_work, "Worker stopped"),
            Err(e) => error!(worker = %self.name, error = %e, "Worker stopped on error"),
        }

        result
    }

    async fn run(&mut self, burst: bool) -> Result<bool, WorkerError> {
        let timeout = if burst { None } else { Some(self.poll_timeout) };
        let mut did_work = false;

        loop {
            // Check for shutdown signal (non-blocking)
            match self.shutdown_rx.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    info!(worker = %self.name, "Worker received shutdown signal");
                    break;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => {}
            }

            match Queue::dequeue_any(&self.queues, &self.registry, timeout).await {
                Ok(Some(job)) => {
                    let outcome = self.process_job(job).await;
                    did_work = true;
                    if let Some(origin) = outcome.origin.as_deref() {
                        self.observe_queue_depth(origin).await;
                    }
                }
                Ok(None) => {
                    if burst {
                        debug!(worker = %self.name, "Queues drained");
                        break;
                    }
                    debug!(worker = %self.name, "No jobs available");
                }
                Err(QueueError::Dequeue(e)) => {
                    // The payload is gone from the store; keep working.
                    self.stats.record_dequeue_error();
                    self.metrics.record_dequeue_error(&e.queue);
                    warn!(
                        worker = %self.name,
                        queue = %e.queue,
                        error = %e.source,
                        "Discarded malformed job"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(did_work)
    }

    /// Publishes the pending count of `queue` to the depth gauge.
    async fn observe_queue_depth(&self, queue: &str) {
        let Some(queue) = self.queues.iter().find(|q| q.name() == queue) else {
            return;
        };
        match queue.count().await {
            Ok(depth) => self.metrics.record_queue_depth(queue.name(), depth),
            Err(e) => debug!(queue = %queue.name(), error = %e, "Could not read queue depth"),
        }
    }

    /// Runs a single job and reports its outcome.
    async fn process_job(&self, job: Job) -> JobOutcome {
        let origin = job.origin.clone().unwrap_or_default();
        let start_time = Instant::now();

        info!(
            worker = %self.name,
            queue = %origin,
            job = %job.description(),
            "Processing job"
        );

        self.stats.executing.fetch_add(1, Ordering::SeqCst);
        self.metrics.job_started();

        let result = job.perform(&self.registry).await;
        let duration = start_time.elapsed();

        self.metrics.job_finished();
        self.stats.executing.fetch_sub(1, Ordering::SeqCst);

        let duration_ms = duration.as_millis() as u64;
        let outcome = match result {
            Ok(value) => {
                self.stats.record_completion(duration);
                info!(
                    worker = %self.name,
                    queue = %origin,
                    duration_ms = duration_ms,
                    result = %value,
                    "Job completed successfully"
                );
                JobOutcome::success(&job, &self.name, value, duration_ms)
            }
            Err(fault) => {
                self.stats.record_failure(duration);
                error!(
                    worker = %self.name,
                    queue = %origin,
                    job = %job.description(),
                    error = %fault,
                    "Job failed"
                );
                JobOutcome::failure(&job, &self.name, &fault, duration_ms)
            }
        };

        self.metrics
            .record_job(&origin, &outcome.status.to_string(), duration.as_secs_f64());

        outcome
    }
}
