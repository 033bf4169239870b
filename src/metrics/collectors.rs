//! High-level interface for recording worker metrics.
//!
//! Every method is a no-op until [`init_metrics`](super::init_metrics) has
//! been called, so library users who do not export metrics pay nothing.

use super::prometheus::{
    ACTIVE_WORKERS, DEQUEUE_ERRORS_TOTAL, JOBS_IN_PROGRESS, JOBS_TOTAL, JOB_DURATION, QUEUE_DEPTH,
};

/// Metrics collector used by workers.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record a finished job.
    ///
    /// # Arguments
    ///
    /// * `queue` - Queue the job came from
    /// * `status` - Final status (e.g., "completed", "failed")
    /// * `duration_secs` - Execution duration in seconds
    pub fn record_job(&self, queue: &str, status: &str, duration_secs: f64) {
        if let Some(jobs_total) = JOBS_TOTAL.get() {
            jobs_total.with_label_values(&[queue, status]).inc();
        }

        if let Some(job_duration) = JOB_DURATION.get() {
            job_duration
                .with_label_values(&[queue])
                .observe(duration_secs);
        }

        tracing::trace!(
            queue = queue,
            status = status,
            duration_secs = duration_secs,
            "Recorded job metric"
        );
    }

    /// Record a malformed payload removed from `queue`.
    pub fn record_dequeue_error(&self, queue: &str) {
        if let Some(errors) = DEQUEUE_ERRORS_TOTAL.get() {
            errors.with_label_values(&[queue]).inc();
        }
    }

    /// Record the number of pending jobs on `queue`.
    pub fn record_queue_depth(&self, queue: &str, depth: usize) {
        if let Some(gauge) = QUEUE_DEPTH.get() {
            gauge.with_label_values(&[queue]).set(depth as f64);
        }
    }

    pub fn job_started(&self) {
        if let Some(gauge) = JOBS_IN_PROGRESS.get() {
            gauge.inc();
        }
    }

    pub fn job_finished(&self) {
        if let Some(gauge) = JOBS_IN_PROGRESS.get() {
            gauge.dec();
        }
    }

    pub fn worker_started(&self) {
        if let Some(gauge) = ACTIVE_WORKERS.get() {
            gauge.inc();
        }
    }

    pub fn worker_stopped(&self) {
        if let Some(gauge) = ACTIVE_WORKERS.get() {
            gauge.dec();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::init_metrics;

    #[test]
    fn test_record_job_counts() {
        let _ = init_metrics();
        let collector = MetricsCollector::new();

        let before = JOBS_TOTAL
            .get()
            .map(|c| c.with_label_values(&["collector-test", "failed"]).get())
            .unwrap_or(0.0);

        collector.record_job("collector-test", "failed", 0.2);

        let after = JOBS_TOTAL
            .get()
            .map(|c| c.with_label_values(&["collector-test", "failed"]).get())
            .unwrap_or(0.0);
        assert!((after - before - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_dequeue_error() {
        let _ = init_metrics();
        let collector = MetricsCollector::new();
        collector.record_dequeue_error("collector-errors");

        let count = DEQUEUE_ERRORS_TOTAL
            .get()
            .map(|c| c.with_label_values(&["collector-errors"]).get())
            .unwrap_or(0.0);
        assert!(count >= 1.0);
    }

    #[test]
    fn test_record_queue_depth() {
        let _ = init_metrics();
        MetricsCollector::new().record_queue_depth("collector-depth", 7);

        let depth = QUEUE_DEPTH
            .get()
            .map(|g| g.with_label_values(&["collector-depth"]).get())
            .unwrap_or(0.0);
        assert!((depth - 7.0).abs() < f64::EPSILON);
    }
}
