//! Dispatcher: the concurrent workers pulling jobs from a store.

use crate::configurator::PoolOptions;
use crate::error::{JobError, JobResult};
use crate::exception::PanicReport;
use crate::job::Job;
use crate::metrics::{JobMetrics, WorkerMetrics};
use crate::monitoring::take_panic_trace;
use crate::pipeline::Pipeline;
use crate::store::JobStore;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Runs `concurrency` workers, each executing one job at a time.
///
/// Only jobs whose names were [`register`](Dispatcher::register)ed are pulled.
/// A stop request ends pickup immediately and waits for in-flight chains.
pub struct Dispatcher<S: JobStore> {
    id: String,
    store: Arc<S>,
    namespace: String,
    options: PoolOptions,
    job_names: Vec<String>,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl<S: JobStore> Dispatcher<S> {
    pub fn new(id: impl Into<String>, store: Arc<S>, namespace: impl Into<String>, options: PoolOptions) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            id: id.into(),
            store,
            namespace: namespace.into(),
            options,
            job_names: Vec::new(),
            shutdown_tx,
            workers: Vec::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Adds a job name to the set pulled from the store.
    pub fn register(&mut self, job_name: &str) {
        if !self.job_names.iter().any(|name| name == job_name) {
            self.job_names.push(job_name.to_string());
        }
    }

    /// Spawns the workers.
    pub fn start(&mut self, pipeline: Arc<Pipeline>) -> JobResult<()> {
        if self.is_running() {
            return Err(JobError::AlreadyRunning);
        }

        self.shutdown_tx.send_replace(false);
        let job_names: Arc<[String]> = self.job_names.clone().into();

        info!(
            pool_id = %self.id,
            namespace = %self.namespace,
            concurrency = self.options.concurrency,
            jobs = ?job_names,
            "Starting workers"
        );
        WorkerMetrics::update_concurrency(&self.id, self.options.concurrency);

        for index in 0..self.options.concurrency {
            let worker = Worker {
                id: format!("{}-{}", self.id, index),
                store: self.store.clone(),
                namespace: self.namespace.clone(),
                job_names: job_names.clone(),
                pipeline: pipeline.clone(),
                poll_interval: self.options.poll_interval,
                counters: self.counters.clone(),
            };
            let span = tracing::info_span!("worker", worker_id = %worker.id);
            let shutdown = self.shutdown_tx.subscribe();
            self.workers.push(tokio::spawn(worker.run(shutdown).instrument(span)));
        }

        Ok(())
    }

    /// Stops pickup and waits for every worker to finish its current job.
    pub async fn stop(&mut self) -> JobResult<()> {
        if !self.is_running() {
            return Err(JobError::NotRunning);
        }

        info!(pool_id = %self.id, "Stopping workers...");
        self.shutdown_tx.send_replace(true);

        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                error!(pool_id = %self.id, error = %e, "Worker task ended abnormally");
            }
        }

        info!(
            pool_id = %self.id,
            processed = self.jobs_processed(),
            failed = self.jobs_failed(),
            "Workers stopped"
        );
        Ok(())
    }

    /// Number of spawned workers not yet joined.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    pub fn jobs_processed(&self) -> u64 {
        self.counters.processed.load(Ordering::Relaxed)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    pub fn job_names(&self) -> &[String] {
        &self.job_names
    }
}

struct Worker<S: JobStore> {
    id: String,
    store: Arc<S>,
    namespace: String,
    job_names: Arc<[String]>,
    pipeline: Arc<Pipeline>,
    poll_interval: std::time::Duration,
    counters: Arc<Counters>,
}

impl<S: JobStore> Worker<S> {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!(worker_id = %self.id, "Worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            // A fetch is never cancelled half way so a popped job is not lost.
            match self.store.fetch(&self.namespace, &self.job_names).await {
                Ok(Some(job)) => {
                    self.process(job).await;
                    continue;
                }
                Ok(None) => {}
                Err(e) => error!(worker_id = %self.id, error = %e, "Failed to fetch job"),
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        debug!(worker_id = %self.id, "Worker stopped");
    }

    async fn process(&self, job: Job) {
        let started = Instant::now();

        // Interceptors run user code, and so does the monitoring sink.
        let result = match AssertUnwindSafe(self.execute(&job)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                take_panic_trace();
                let report = PanicReport::from_payload(payload.as_ref());
                error!(
                    job = %job.name,
                    job_id = %job.id,
                    panic = %report.message,
                    "Job chain panicked outside the error-capture interceptor"
                );
                JobMetrics::job_panicked(&job.name);
                Err(JobError::Panicked {
                    message: report.message,
                })
            }
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.store.complete(&self.namespace, &job).await {
                    error!(job_id = %job.id, error = %e, "Failed to mark job as complete");
                }
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                JobMetrics::job_completed(&self.namespace, &job.name, started.elapsed());
            }
            Err(err) => {
                if let Err(e) = self.store.fail(&self.namespace, &job, &err).await {
                    error!(job_id = %job.id, error = %e, "Failed to mark job as failed");
                }
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                JobMetrics::job_failed(&self.namespace, &job.name, started.elapsed());
            }
        }
    }

    async fn execute(&self, job: &Job) -> JobResult<()> {
        match self.pipeline.resolve(&job.name) {
            Some(handler) => self.pipeline.run(job, handler.as_ref()).await,
            None => {
                error!(job = %job.name, job_id = %job.id, "No handler registered for job");
                Err(JobError::UnknownJob(job.name.clone()))
            }
        }
    }
}
