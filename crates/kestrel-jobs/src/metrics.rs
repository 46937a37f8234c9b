//! Metrics for worker pool monitoring.
//!
//! Recorded through the `metrics` facade; installing an exporter is up to the
//! embedding process.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names.
pub mod names {
    /// Total jobs enqueued.
    pub const JOBS_ENQUEUED_TOTAL: &str = "kestrel_jobs_enqueued_total";
    /// Total jobs completed successfully.
    pub const JOBS_COMPLETED_TOTAL: &str = "kestrel_jobs_completed_total";
    /// Total jobs failed (errors and recovered panics).
    pub const JOBS_FAILED_TOTAL: &str = "kestrel_jobs_failed_total";
    /// Total recovered panics.
    pub const JOBS_PANICKED_TOTAL: &str = "kestrel_jobs_panicked_total";
    /// Total jobs scheduled for retry.
    pub const JOBS_RETRIED_TOTAL: &str = "kestrel_jobs_retried_total";
    /// Total jobs moved to the dead set.
    pub const JOBS_DEAD_TOTAL: &str = "kestrel_jobs_dead_total";

    /// Job execution duration in seconds.
    pub const JOB_DURATION_SECONDS: &str = "kestrel_job_duration_seconds";

    /// Worker pool concurrency.
    pub const WORKERS_CONCURRENCY: &str = "kestrel_workers_concurrency";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::JOBS_ENQUEUED_TOTAL, "Total number of jobs enqueued");
    describe_counter!(names::JOBS_COMPLETED_TOTAL, "Total number of jobs completed successfully");
    describe_counter!(names::JOBS_FAILED_TOTAL, "Total number of jobs that failed");
    describe_counter!(names::JOBS_PANICKED_TOTAL, "Total number of recovered job panics");
    describe_counter!(names::JOBS_RETRIED_TOTAL, "Total number of job retries scheduled");
    describe_counter!(names::JOBS_DEAD_TOTAL, "Total number of jobs moved to the dead set");
    describe_histogram!(names::JOB_DURATION_SECONDS, "Job execution duration in seconds");
    describe_gauge!(names::WORKERS_CONCURRENCY, "Worker pool concurrency setting");
}

/// Job metrics recorder.
#[derive(Clone)]
pub struct JobMetrics;

impl JobMetrics {
    pub fn job_enqueued(namespace: &str, job_name: &str) {
        counter!(
            names::JOBS_ENQUEUED_TOTAL,
            "namespace" => namespace.to_string(),
            "job_name" => job_name.to_string()
        )
        .increment(1);
    }

    pub fn job_completed(namespace: &str, job_name: &str, duration: Duration) {
        counter!(
            names::JOBS_COMPLETED_TOTAL,
            "namespace" => namespace.to_string(),
            "job_name" => job_name.to_string()
        )
        .increment(1);

        histogram!(
            names::JOB_DURATION_SECONDS,
            "namespace" => namespace.to_string(),
            "job_name" => job_name.to_string(),
            "status" => "completed"
        )
        .record(duration.as_secs_f64());
    }

    pub fn job_failed(namespace: &str, job_name: &str, duration: Duration) {
        counter!(
            names::JOBS_FAILED_TOTAL,
            "namespace" => namespace.to_string(),
            "job_name" => job_name.to_string()
        )
        .increment(1);

        histogram!(
            names::JOB_DURATION_SECONDS,
            "namespace" => namespace.to_string(),
            "job_name" => job_name.to_string(),
            "status" => "failed"
        )
        .record(duration.as_secs_f64());
    }

    pub fn job_panicked(job_name: &str) {
        counter!(names::JOBS_PANICKED_TOTAL, "job_name" => job_name.to_string()).increment(1);
    }

    pub fn job_retried(namespace: &str, job_name: &str, fails: u32) {
        counter!(
            names::JOBS_RETRIED_TOTAL,
            "namespace" => namespace.to_string(),
            "job_name" => job_name.to_string(),
            "fails" => fails.to_string()
        )
        .increment(1);
    }

    pub fn job_dead(namespace: &str, job_name: &str) {
        counter!(
            names::JOBS_DEAD_TOTAL,
            "namespace" => namespace.to_string(),
            "job_name" => job_name.to_string()
        )
        .increment(1);
    }
}

/// Worker metrics recorder.
#[derive(Clone)]
pub struct WorkerMetrics;

impl WorkerMetrics {
    pub fn update_concurrency(pool_id: &str, concurrency: usize) {
        gauge!(names::WORKERS_CONCURRENCY, "pool_id" => pool_id.to_string()).set(concurrency as f64);
    }
}
